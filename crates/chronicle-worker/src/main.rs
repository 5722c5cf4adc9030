//! Chronicle worker entry point.
//!
//! Applies migrations, then drains the publication outbox on a fixed
//! interval until interrupted. Events left pending by a crash between append
//! and publish are delivered here.

use std::sync::Arc;

use chronicle_core::clock::SystemClock;
use chronicle_core::id::RandomIds;
use chronicle_event_store::pg_audit_store::PgAuditStore;
use chronicle_event_store::pg_event_log::PgEventLog;
use chronicle_event_store::schema::run_migrations;
use chronicle_orders::domain::aggregates::Order;
use chronicle_pipeline::handlers::audit::AuditSink;
use chronicle_pipeline::handlers::notification::{NotificationHandler, TracingNotifier};
use chronicle_pipeline::handlers::snapshot::{SnapshotProjection, SnapshotStore};
use chronicle_pipeline::locks::EntityLocks;
use chronicle_pipeline::outbox::OutboxRelay;
use chronicle_pipeline::publisher::EventPublisher;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod config;
mod error;

use config::WorkerConfig;
use error::WorkerError;

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Chronicle outbox worker");

    let config = WorkerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    run_migrations(&pool).await?;

    let publisher = EventPublisher::new()
        .with_handler(Arc::new(SnapshotProjection::new(Arc::new(
            SnapshotStore::<Order>::new(),
        ))))
        .with_handler(Arc::new(AuditSink::new(
            Arc::new(PgAuditStore::new(pool.clone())),
            Arc::new(SystemClock),
            Arc::new(RandomIds),
        )))
        .with_handler(Arc::new(NotificationHandler::new(Arc::new(TracingNotifier))));

    let relay = OutboxRelay::new(
        Arc::new(PgEventLog::new(pool)),
        Arc::new(publisher),
        Arc::new(EntityLocks::new()),
        config.retry_policy(),
        config.outbox_batch_size,
    );

    tracing::info!(
        batch_size = config.outbox_batch_size,
        poll_interval_ms = u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX),
        "Relaying pending publications"
    );

    let mut ticker = tokio::time::interval(config.poll_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = relay.drain().await {
                    tracing::error!(error = %e, "outbox drain failed");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
