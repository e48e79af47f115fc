//! # smarthubd: smarthub backend daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (`smarthub.toml`, env vars) and install logging
//! - Initialize the `SQLite` connection pool and run migrations, retrying
//!   while the database is unavailable
//! - Construct the storage adapters and the MQTT client
//! - Construct application services from the dependency context
//! - Run the bus event loop in the background
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use smarthub_adapter_http_axum::metrics::HttpMetrics;
use smarthub_adapter_http_axum::state::AppState;
use smarthub_adapter_storage_sqlite_sqlx::{
    Database, SqliteDeviceRepository, SqliteUsageStore, StorageError,
};
use smarthub_app::context::Context;
use smarthub_app::retry::{RetryError, RetryPolicy, retry};
use smarthub_app::services::analytics_service::AnalyticsService;
use smarthub_app::services::device_service::DeviceService;
use smarthub_app::services::sync_service::SyncService;
use smarthub_domain::schema::SchemaRegistry;
use smarthub_domain::sync::Origin;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Connection failures may clear up; a broken migration will not.
fn is_transient(err: &StorageError) -> bool {
    matches!(err, StorageError::Database(_))
}

/// Open the store, retrying transient failures under `policy`.
///
/// Exhaustion is the one startup failure that stops the daemon, so it is
/// returned as is rather than flattened into the last storage error.
async fn connect_database(
    database_url: &str,
    policy: &RetryPolicy,
) -> Result<Database, RetryError<StorageError>> {
    let db_config = smarthub_adapter_storage_sqlite_sqlx::Config {
        database_url: database_url.to_string(),
    };
    retry(policy, is_transient, || db_config.build())
        .await
        .inspect_err(|err| match err {
            RetryError::Exhausted { attempts, last } => {
                tracing::error!(attempts, error = ?last, "store unreachable after {attempts} attempts");
            }
            RetryError::Fatal(last) => {
                tracing::error!(error = ?last, "store cannot be opened");
            }
        })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = connect_database(config.database_url(), &config.retry).await?;
    let pool = db.pool().clone();

    // Bus
    let sender_id = config.sender_id();
    let (transport, event_loop) = smarthub_adapter_mqtt::connect(&config.mqtt, &sender_id);

    let context = Context::new(SchemaRegistry::new(&config.schema))
        .with_device_store(Arc::new(SqliteDeviceRepository::new(pool.clone())))
        .with_usage_store(Arc::new(SqliteUsageStore::new(pool)))
        .with_bus(Arc::new(transport));

    // Services
    let devices = Arc::new(DeviceService::from_context(&context)?);
    let sync = Arc::new(SyncService::from_context(
        &context,
        Arc::clone(&devices),
        Origin::new(sender_id.clone(), config.mqtt.sender_group.clone()),
        config.mqtt.base_topic.clone(),
    )?);
    let analytics = Arc::new(AnalyticsService::from_context(&context)?);

    tracing::info!(
        %sender_id,
        broker = %format!("{}:{}", config.mqtt.broker_host, config.mqtt.broker_port),
        topic = %config.mqtt.base_topic,
        "starting bus event loop"
    );
    let bus_task = tokio::spawn(event_loop.run(Arc::clone(&sync)));

    // HTTP
    let metrics = Arc::new(HttpMetrics::new()?);
    let app = smarthub_adapter_http_axum::router::build(AppState::new(
        devices, sync, analytics, metrics,
    ));

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("smarthubd listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    bus_task.abort();
    tracing::info!("smarthubd stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}
