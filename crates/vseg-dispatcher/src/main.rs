//! Transcode dispatcher binary.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vseg_dispatcher::config::Config;
use vseg_dispatcher::handler::MessageHandler;
use vseg_dispatcher::health::{self, HealthState};
use vseg_dispatcher::object_store::ObjectStore;
use vseg_k8s::{JobSubmitter, KubeClient};
use vseg_queue::{AmqpStatusPublisher, Consumer, StatusPublisher};
use vseg_state::{ProgressStore, RedisProgressStore};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("starting transcode dispatcher");

    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "configuration loading failed");
            std::process::exit(1);
        }
    };

    let store = match RedisProgressStore::connect(&config.store).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "Redis connection failed");
            std::process::exit(1);
        }
    };

    let kubernetes = match KubeClient::new().await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Kubernetes client initialization failed");
            std::process::exit(1);
        }
    };

    // Optional collaborator: a missing object store degrades readiness
    // reporting, not dispatching.
    let object_store = match ObjectStore::new(&config.object_store) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "object store client unavailable");
            None
        }
    };

    let publisher = Arc::new(AmqpStatusPublisher::new(config.broker.clone()));

    let handler = Arc::new(MessageHandler::new(
        Arc::clone(&config),
        Arc::clone(&kubernetes) as Arc<dyn JobSubmitter>,
        Arc::clone(&store) as Arc<dyn ProgressStore>,
        Arc::clone(&publisher) as Arc<dyn StatusPublisher>,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handler_permits = Arc::new(Semaphore::new(config.app.max_concurrent_handlers));

    let consumer = Consumer::new(
        config.broker.clone(),
        handler,
        Arc::clone(&handler_permits),
        shutdown_rx.clone(),
    );
    let consumer_task = tokio::spawn(consumer.run());
    info!("broker consumer started");

    let health_state = HealthState {
        store: Arc::clone(&store) as Arc<dyn ProgressStore>,
        broker_url: config.broker.amqp_url(),
        kubernetes: Arc::clone(&kubernetes),
        object_store,
    };
    let health_port = config.health.port;
    let health_shutdown = shutdown_rx.clone();
    let health_task = tokio::spawn(async move {
        if let Err(e) = health::serve(health_port, health_state, health_shutdown).await {
            error!(error = %e, "health server error");
        }
    });
    info!("health server started");

    wait_for_shutdown_signal().await;

    info!("initiating graceful shutdown");
    shutdown_tx.send(true).ok();

    let max_handlers = config.app.max_concurrent_handlers as u32;
    let drain = async {
        // All permits back means no handler is still in flight.
        let _ = handler_permits.acquire_many(max_handlers).await;
        consumer_task.await.ok();
        health_task.await.ok();
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        warn!("graceful shutdown timed out with work still in flight");
    }

    publisher.close().await;
    info!("transcode dispatcher shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let debug_enabled = std::env::var("LOG_DEBUG")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false);

    let default_level = if debug_enabled { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!(error = %e, "failed to register SIGTERM handler");
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = terminate.recv() => info!("received SIGTERM"),
    }
}
