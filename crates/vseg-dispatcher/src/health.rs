//! Health-probe HTTP server.
//!
//! Liveness covers the dependencies the dispatch path cannot run without
//! (store, broker); readiness additionally checks the object store and the
//! orchestrator API. Probe logging stays at debug so probes are quiet unless
//! `LOG_DEBUG` raises the level.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use lapin::{Connection, ConnectionProperties};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info};

use vseg_k8s::KubeClient;
use vseg_state::ProgressStore;

use crate::object_store::ObjectStore;

const LIVENESS_TIMEOUT: Duration = Duration::from_secs(2);
const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Dependencies the probes exercise.
#[derive(Clone)]
pub struct HealthState {
    pub store: Arc<dyn ProgressStore>,
    pub broker_url: String,
    pub kubernetes: Arc<KubeClient>,
    pub object_store: Option<Arc<ObjectStore>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: &'static str,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Check {
    fn healthy(name: &'static str) -> Self {
        Self {
            name,
            status: HealthStatus::Healthy,
            error: None,
        }
    }

    fn unhealthy(name: &'static str, error: impl Into<String>) -> Self {
        Self {
            name,
            status: HealthStatus::Unhealthy,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<Check>,
}

fn overall(checks: &[Check]) -> HealthStatus {
    if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    }
}

fn respond(checks: Vec<Check>) -> (StatusCode, Json<HealthResponse>) {
    let status = overall(&checks);
    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(HealthResponse { status, checks }))
}

async fn liveness(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    debug!("liveness probe");
    let (store, broker) = tokio::join!(
        check_store(&state, LIVENESS_TIMEOUT),
        check_broker(&state, LIVENESS_TIMEOUT),
    );
    respond(vec![store, broker])
}

async fn readiness(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    debug!("readiness probe");
    let (store, broker, object_store, kubernetes) = tokio::join!(
        check_store(&state, READINESS_TIMEOUT),
        check_broker(&state, READINESS_TIMEOUT),
        check_object_store(&state, READINESS_TIMEOUT),
        check_kubernetes(&state, READINESS_TIMEOUT),
    );
    respond(vec![store, broker, object_store, kubernetes])
}

async fn check_store(state: &HealthState, limit: Duration) -> Check {
    match tokio::time::timeout(limit, state.store.health_check()).await {
        Ok(Ok(())) => Check::healthy("redis"),
        Ok(Err(e)) => Check::unhealthy("redis", format!("redis health check failed: {e}")),
        Err(_) => Check::unhealthy("redis", "redis check timed out"),
    }
}

async fn check_broker(state: &HealthState, limit: Duration) -> Check {
    let dial = async {
        let connection =
            Connection::connect(&state.broker_url, ConnectionProperties::default()).await?;
        connection.close(200, "health check").await.ok();
        Ok::<_, lapin::Error>(())
    };
    match tokio::time::timeout(limit, dial).await {
        Ok(Ok(())) => Check::healthy("rabbitmq"),
        Ok(Err(e)) => Check::unhealthy("rabbitmq", format!("rabbitmq connection failed: {e}")),
        Err(_) => Check::unhealthy("rabbitmq", "rabbitmq check timed out"),
    }
}

async fn check_object_store(state: &HealthState, limit: Duration) -> Check {
    let Some(object_store) = &state.object_store else {
        // The object store is an optional collaborator; its absence must not
        // fail readiness, only show up in the report.
        return Check {
            name: "minio",
            status: HealthStatus::Healthy,
            error: Some("object store client not configured (optional)".to_string()),
        };
    };
    match tokio::time::timeout(limit, object_store.bucket_ping()).await {
        Ok(Ok(())) => Check::healthy("minio"),
        Ok(Err(e)) => Check::unhealthy("minio", format!("minio health check failed: {e}")),
        Err(_) => Check::unhealthy("minio", "minio check timed out"),
    }
}

async fn check_kubernetes(state: &HealthState, limit: Duration) -> Check {
    match tokio::time::timeout(limit, state.kubernetes.is_healthy()).await {
        Ok(true) => Check::healthy("kubernetes"),
        Ok(false) => Check::unhealthy("kubernetes", "kubernetes health check failed"),
        Err(_) => Check::unhealthy("kubernetes", "kubernetes check timed out"),
    }
}

/// Serve the probe endpoints until shutdown is signalled.
pub async fn serve(
    port: u16,
    state: HealthState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let app = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .with_state(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "health server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_unhealthy_check_degrades_the_overall_status() {
        let checks = vec![
            Check::healthy("redis"),
            Check::unhealthy("rabbitmq", "down"),
        ];
        assert_eq!(overall(&checks), HealthStatus::Unhealthy);
    }

    #[test]
    fn all_healthy_checks_report_healthy() {
        let checks = vec![Check::healthy("redis"), Check::healthy("rabbitmq")];
        assert_eq!(overall(&checks), HealthStatus::Healthy);
    }

    #[test]
    fn error_field_is_omitted_when_absent() {
        let value = serde_json::to_value(Check::healthy("redis")).unwrap();
        assert_eq!(value["status"], "healthy");
        assert!(value.get("error").is_none());

        let value = serde_json::to_value(Check::unhealthy("redis", "down")).unwrap();
        assert_eq!(value["status"], "unhealthy");
        assert_eq!(value["error"], "down");
    }
}
