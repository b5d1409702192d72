//! Resource naming and descriptor builders.
//!
//! Names, labels, mount paths, env-var names, and the container command are
//! part of the interface with the transcoder image; changing any of them is a
//! wire change for downstream jobs.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec as BatchJobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EmptyDirVolumeSource, EnvVar, KeyToPath, PodSpec,
    PodTemplateSpec, ResourceRequirements, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use vseg_models::{sanitize_label, JobSpec};

/// File name of the timestamp data inside the config map and the pod.
pub const TIMESTAMP_FILE: &str = "timestamps.txt";

/// Annotation linking a job back to its timestamp config map.
pub const TIMESTAMP_CONFIGMAP_ANNOTATION: &str = "timestamp-configmap";

const TIMESTAMP_MOUNT: &str = "/transcode-data/timestamps";
const MC_CONFIG_MOUNT: &str = "/mc_config";
const RABBITMQ_ADMIN_MOUNT: &str = "/rabbitmqadmin_config";
const MC_SECRET_INIT_MOUNT: &str = "/tmp/secret-mc-config";
const MC_WRITABLE_INIT_MOUNT: &str = "/init-mc-config";

const RABBITMQ_ADMIN_CONFIG_FILE: &str = "rabbitmqadmin.conf";

/// Orchestrator name-length limit leaves room for the segment/resolution
/// suffix, so the video portion of a job name is capped harder.
const JOB_NAME_VIDEO_ID_LIMIT: usize = 30;

/// Name of the config map carrying a segment's timestamp data.
pub fn config_map_name(spec: &JobSpec) -> String {
    format!("ts-{}-{}", sanitize_label(&spec.video_id), spec.segment_id)
}

/// Name of the batch job for one (segment, resolution). Deterministic, so a
/// replayed message collides with the first submission instead of duplicating
/// work.
pub fn job_name(spec: &JobSpec) -> String {
    let mut video_id = sanitize_label(&spec.video_id);
    video_id.truncate(JOB_NAME_VIDEO_ID_LIMIT);
    format!(
        "transcode-{}-{}-{}",
        video_id, spec.segment_id, spec.resolution
    )
}

fn resource_labels(spec: &JobSpec) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), "transcoder".to_string()),
        ("video-id".to_string(), sanitize_label(&spec.video_id)),
        ("segment-id".to_string(), spec.segment_id.to_string()),
        ("resolution".to_string(), spec.resolution.clone()),
    ])
}

/// Config map holding the newline-joined timestamp data.
pub fn build_config_map(spec: &JobSpec) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(config_map_name(spec)),
            namespace: Some(spec.namespace.clone()),
            labels: Some(resource_labels(spec)),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            TIMESTAMP_FILE.to_string(),
            spec.timestamp_data.clone(),
        )])),
        ..Default::default()
    }
}

/// Batch job running the transcoder for one (segment, resolution).
pub fn build_job(spec: &JobSpec) -> Job {
    let name = job_name(spec);
    let config_map = config_map_name(spec);

    Job {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: Some(spec.namespace.clone()),
            labels: Some(resource_labels(spec)),
            annotations: Some(BTreeMap::from([(
                TIMESTAMP_CONFIGMAP_ANNOTATION.to_string(),
                config_map.clone(),
            )])),
            ..Default::default()
        },
        spec: Some(BatchJobSpec {
            backoff_limit: Some(2),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(resource_labels(spec)),
                    ..Default::default()
                }),
                spec: Some(build_pod_spec(spec, &config_map)),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_pod_spec(spec: &JobSpec, config_map: &str) -> PodSpec {
    PodSpec {
        init_containers: Some(vec![build_init_container(spec)]),
        containers: vec![build_transcode_container(spec)],
        volumes: Some(build_volumes(spec, config_map)),
        // The job's backoff limit owns retries.
        restart_policy: Some("Never".to_string()),
        ..Default::default()
    }
}

/// Stages the object-store config from its read-only secret mount into a
/// writable directory the main container can use.
fn build_init_container(spec: &JobSpec) -> Container {
    let command = format!(
        "mkdir -p {dir} && cp {secret}/config.json {dir}/config.json && chmod -R 777 {dir}",
        dir = MC_WRITABLE_INIT_MOUNT,
        secret = MC_SECRET_INIT_MOUNT,
    );

    Container {
        name: "init-mc-config-copy".to_string(),
        image: Some(spec.mc_config_init_image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec!["sh".to_string(), "-c".to_string(), command]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "minio-config-volume".to_string(),
                mount_path: MC_SECRET_INIT_MOUNT.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: "mc-config-writable".to_string(),
                mount_path: MC_WRITABLE_INIT_MOUNT.to_string(),
                read_only: Some(false),
                ..Default::default()
            },
        ]),
        resources: Some(ResourceRequirements {
            requests: Some(resource_list("50m", "64Mi")),
            limits: Some(resource_list("100m", "128Mi")),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_transcode_container(spec: &JobSpec) -> Container {
    Container {
        name: "transcoder".to_string(),
        image: Some(spec.image.clone()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        command: Some(vec!["./transcode.sh".to_string()]),
        args: Some(build_transcode_args(spec)),
        env: Some(build_env(spec)),
        volume_mounts: Some(vec![
            VolumeMount {
                name: "timestamp-volume".to_string(),
                mount_path: TIMESTAMP_MOUNT.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: "mc-config-writable".to_string(),
                mount_path: MC_CONFIG_MOUNT.to_string(),
                read_only: Some(false),
                ..Default::default()
            },
            VolumeMount {
                name: "rabbitmq-admin-config-volume".to_string(),
                mount_path: RABBITMQ_ADMIN_MOUNT.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
        ]),
        resources: Some(ResourceRequirements {
            requests: Some(resource_list("500m", "512Mi")),
            limits: Some(resource_list("1", "1Gi")),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn build_transcode_args(spec: &JobSpec) -> Vec<String> {
    let mut args = vec![
        format!("--job-id={}", spec.segment_id),
        format!("--video-path={}", spec.video_url),
        format!("--timestamp-file={TIMESTAMP_MOUNT}/{TIMESTAMP_FILE}"),
        format!("--crf={}", spec.crf),
        format!("--preset={}", spec.preset),
        format!("--resolution={}", spec.resolution),
        format!("--video-id={}", spec.video_id),
    ];
    if spec.allow_http {
        args.push("--allow-http".to_string());
    }
    args
}

fn build_env(spec: &JobSpec) -> Vec<EnvVar> {
    let mut env = vec![
        env_var("BUCKET_NAME", &spec.output_bucket),
        env_var("REDIS_HOST", &spec.redis_host),
        env_var("REDIS_PORT", spec.redis_port.to_string()),
    ];
    if !spec.redis_password.is_empty() {
        env.push(env_var("REDISCLI_AUTH", &spec.redis_password));
    }
    env.extend([
        env_var("REDIS_DB", spec.redis_db.to_string()),
        env_var("REDIS_TOTAL_JOBS_KEY", &spec.total_jobs_key),
        env_var("REDIS_COMPLETED_JOBS_KEY", &spec.completed_jobs_key),
        env_var("REDIS_MASTER_PLAYLIST_META", &spec.master_playlist_meta_key),
        env_var("MC_CONFIG_DIR", MC_CONFIG_MOUNT),
        env_var("MINIO_ALIAS", &spec.minio_alias),
        env_var("RABBITMQ_EXCHANGE", &spec.rabbitmq_exchange),
        env_var("RABBITMQ_ROUTING_KEY", &spec.rabbitmq_routing_key),
        env_var(
            "RABBITMQADMIN_CONFIG",
            format!("{RABBITMQ_ADMIN_MOUNT}/{RABBITMQ_ADMIN_CONFIG_FILE}"),
        ),
    ]);
    env
}

fn build_volumes(spec: &JobSpec, config_map: &str) -> Vec<Volume> {
    vec![
        Volume {
            name: "timestamp-volume".to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: Some(config_map.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: "minio-config-volume".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(spec.minio_secret_name.clone()),
                items: Some(vec![KeyToPath {
                    key: "config.json".to_string(),
                    path: "config.json".to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: "rabbitmq-admin-config-volume".to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(spec.rabbitmq_admin_secret_name.clone()),
                items: Some(vec![KeyToPath {
                    key: RABBITMQ_ADMIN_CONFIG_FILE.to_string(),
                    path: RABBITMQ_ADMIN_CONFIG_FILE.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: "mc-config-writable".to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ]
}

fn env_var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn resource_list(cpu: &str, memory: &str) -> BTreeMap<String, Quantity> {
    BTreeMap::from([
        ("cpu".to_string(), Quantity(cpu.to_string())),
        ("memory".to_string(), Quantity(memory.to_string())),
    ])
}
