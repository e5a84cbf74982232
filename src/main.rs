//! Exam Evaluations - Worker Entry Point
//!
//! Wires storage and the Redis executor transport, then ingests execution
//! outcomes until SIGINT/SIGTERM.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use redis::Client as RedisClient;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exam_evaluations::{
    config::CONFIG,
    db::{self, MemoryStore, PgStore},
    execution::{RedisExecutionSender, ResultConsumer},
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let json_logs = CONFIG.service.json_logs;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| CONFIG.service.rust_log.clone().into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting exam evaluations worker...");

    // Initialize Redis connection
    tracing::info!("Connecting to Redis...");
    let redis_client = RedisClient::open(CONFIG.redis.url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;

    let sender = Arc::new(RedisExecutionSender::new(
        redis_conn.clone(),
        CONFIG.execution.request_stream.clone(),
    ));

    // Pick the storage adapter
    let state = match &CONFIG.database.url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db_pool = db::create_pool(url, CONFIG.database.max_connections).await?;
            db::test_connection(&db_pool).await?;

            tracing::info!("Running database migrations...");
            db::run_migrations(&db_pool).await?;

            AppState::new(Arc::new(PgStore::new(db_pool)), sender)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping all data in memory");
            AppState::new(Arc::new(MemoryStore::new()), sender)
        }
    };

    // Surface domain events in the log
    let mut events = state.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => tracing::debug!(event = ?event, "Domain event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Domain event log lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Create shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();

    // Setup signal handlers
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        tracing::info!("Shutdown signal received, finishing current message...");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    // Create and initialize consumer
    let consumer = ResultConsumer::new(
        CONFIG.execution.clone(),
        redis_conn,
        state.grading(),
        shutdown,
    );
    consumer.initialize().await?;

    tracing::info!("Worker ready, consuming execution outcomes");
    consumer.run().await?;

    tracing::info!("Worker shutdown complete");
    Ok(())
}
