//! Service configuration from the environment.

use std::collections::HashMap;
use std::str::FromStr;

use thiserror::Error;

use vseg_queue::BrokerConfig;
use vseg_state::StoreConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {var}: {detail}")]
    Parse { var: &'static str, detail: String },
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub broker: BrokerConfig,
    pub store: StoreConfig,
    pub kubernetes: KubernetesSettings,
    pub object_store: ObjectStoreSettings,
    pub transcode: TranscodeSettings,
    pub app: AppSettings,
    pub health: HealthSettings,
}

impl Config {
    /// Load everything from the environment. Broker and store settings are
    /// owned by their crates; only the transcode maps can fail to parse.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            broker: BrokerConfig::from_env(),
            store: StoreConfig::from_env(),
            kubernetes: KubernetesSettings::from_env(),
            object_store: ObjectStoreSettings::from_env(),
            transcode: TranscodeSettings::from_env()?,
            app: AppSettings::from_env(),
            health: HealthSettings::from_env(),
        })
    }
}

/// Orchestrator-side settings for emitted jobs.
#[derive(Debug, Clone)]
pub struct KubernetesSettings {
    pub namespace: String,
    pub minio_secret_name: String,
    pub rabbitmq_admin_secret_name: String,
    pub mc_config_init_image: String,
    pub allow_http_job_arg: bool,
}

impl KubernetesSettings {
    pub fn from_env() -> Self {
        Self {
            namespace: get_env("KUBERNETES_NAMESPACE", "default"),
            minio_secret_name: get_env("MINIO_SECRET_NAME", "minio-secret"),
            rabbitmq_admin_secret_name: get_env(
                "RABBITMQ_ADMIN_SECRET_NAME",
                "rabbitmq-admin-secret",
            ),
            mc_config_init_image: get_env("MC_CONFIG_INIT_IMAGE", "alpine:latest"),
            allow_http_job_arg: get_env_parsed("ALLOW_HTTP_JOB_ARG", true),
        }
    }
}

/// Object-store coordinates, forwarded to jobs and used for health pings.
#[derive(Debug, Clone)]
pub struct ObjectStoreSettings {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
    pub output_bucket: String,
    pub alias: String,
}

impl ObjectStoreSettings {
    pub fn from_env() -> Self {
        Self {
            endpoint: get_env("MINIO_ENDPOINT", "localhost:9000"),
            access_key: get_env("MINIO_ACCESS_KEY", ""),
            secret_key: get_env("MINIO_SECRET_KEY", ""),
            use_ssl: get_env_parsed("MINIO_USE_SSL", false),
            output_bucket: get_env("MINIO_OUTPUT_BUCKET", "transcoded-videos"),
            alias: get_env("DEFAULT_MINIO_ALIAS", "transcoder"),
        }
    }
}

/// Encoder settings and the per-resolution fan-out tables.
#[derive(Debug, Clone)]
pub struct TranscodeSettings {
    pub image: String,
    pub preset: String,
    pub resolutions: Vec<String>,
    pub crf_map: HashMap<String, i32>,
    pub master_playlist: HashMap<String, i64>,
}

impl TranscodeSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let resolutions = get_env("RESOLUTIONS", "240,360,480,720,1080")
            .split(',')
            .map(str::to_string)
            .collect();

        let crf_map = parse_pair_map(
            "CRF_MAP",
            &get_env("CRF_MAP", "240:36,360:34,480:32,720:30,1080:28"),
        )?;
        let master_playlist = parse_pair_map(
            "MASTER_PLAYLIST",
            &get_env(
                "MASTER_PLAYLIST",
                "240:500000,360:800000,480:1200000,720:2000000,1080:5000000",
            ),
        )?;

        Ok(Self {
            image: get_env("TRANSCODE_IMAGE", "transcode:latest"),
            preset: get_env("TRANSCODE_PRESET", "ultrafast"),
            resolutions,
            crf_map,
            master_playlist,
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub max_concurrent_handlers: usize,
}

impl AppSettings {
    pub fn from_env() -> Self {
        Self {
            max_concurrent_handlers: get_env_parsed("MAX_CONCURRENT_HANDLERS", 10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub port: u16,
}

impl HealthSettings {
    pub fn from_env() -> Self {
        Self {
            port: get_env_parsed("HEALTH_PORT", 8080),
        }
    }
}

fn get_env(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn get_env_parsed<T: FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(fallback)
}

/// Parse a `res:value,res:value` list into a map.
fn parse_pair_map<T: FromStr>(
    var: &'static str,
    raw: &str,
) -> Result<HashMap<String, T>, ConfigError> {
    let mut map = HashMap::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        let Some((resolution, value)) = pair.split_once(':') else {
            return Err(ConfigError::Parse {
                var,
                detail: format!("invalid pair format: '{pair}'"),
            });
        };
        let resolution = resolution.trim();
        let value = value.trim();
        let parsed = value.parse::<T>().map_err(|_| ConfigError::Parse {
            var,
            detail: format!("invalid value for resolution {resolution}: '{value}'"),
        })?;
        map.insert(resolution.to_string(), parsed);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_crf_pairs() {
        let map: HashMap<String, i32> = parse_pair_map("CRF_MAP", "240:36,360:34").unwrap();
        assert_eq!(map["240"], 36);
        assert_eq!(map["360"], 34);
    }

    #[test]
    fn tolerates_whitespace_around_pairs() {
        let map: HashMap<String, i32> = parse_pair_map("CRF_MAP", " 240 : 36 , 360:34").unwrap();
        assert_eq!(map["240"], 36);
        assert_eq!(map["360"], 34);
    }

    #[test]
    fn rejects_pair_without_separator() {
        let result: Result<HashMap<String, i32>, _> = parse_pair_map("CRF_MAP", "240=36");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("invalid pair format"));
    }

    #[test]
    fn rejects_non_numeric_value() {
        let result: Result<HashMap<String, i64>, _> =
            parse_pair_map("MASTER_PLAYLIST", "240:fast");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("invalid value for resolution 240"));
    }

    #[test]
    fn default_transcode_tables_are_consistent() {
        let settings = TranscodeSettings::from_env().unwrap();
        assert_eq!(settings.resolutions.len(), 5);
        for resolution in &settings.resolutions {
            assert!(settings.crf_map.contains_key(resolution));
            assert!(settings.master_playlist.contains_key(resolution));
        }
    }
}
