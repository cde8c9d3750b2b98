//! Herald delivery worker.
//!
//! Long-running process hosting the delivery executor, the deadline sweep,
//! and the durable event-log writer. Shuts down cooperatively on SIGINT:
//! no new targets are claimed, in-flight sends complete and are recorded.

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use herald_core::backoff::RetryPolicy;
use herald_engine::scheduler::DeliveryScheduler;
use herald_engine::{DeliveryExecutor, ExecutorConfig};
use herald_events::{EventBus, EventPersistence};
use herald_outbound::{GatewayConfig, HttpGateway, OutboundChannel, SmtpChannel, SmtpConfig};

use crate::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_worker=info,herald_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env();
    let pool = herald_db::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    herald_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    let channel = build_channel()?;
    let bus = Arc::new(EventBus::default());
    let cancel = CancellationToken::new();

    let persistence = tokio::spawn(EventPersistence::run(pool.clone(), bus.subscribe()));

    let sweep = tokio::spawn(DeliveryScheduler::run_sweep(
        pool.clone(),
        bus.clone(),
        cancel.clone(),
    ));

    let executor = DeliveryExecutor::new(
        pool.clone(),
        channel,
        bus.clone(),
        ExecutorConfig {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            claim_batch: config.claim_batch,
            max_in_flight: config.max_in_flight,
            retry: RetryPolicy::default(),
        },
    );
    let executor_cancel = cancel.clone();
    let executor_task = tokio::spawn(async move {
        executor.run(executor_cancel).await;
    });

    tracing::info!("Worker started, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    cancel.cancel();
    executor_task.await.ok();
    sweep.await.ok();

    // Dropping the bus closes the broadcast channel, letting the
    // persistence task drain and exit.
    drop(bus);
    persistence.await.ok();

    tracing::info!("Worker stopped");
    Ok(())
}

/// Pick the configured outbound channel: the HTTP gateway when
/// `GATEWAY_URL` is set, otherwise SMTP when `SMTP_HOST` is set.
fn build_channel() -> anyhow::Result<Arc<dyn OutboundChannel>> {
    if let Some(gateway) = GatewayConfig::from_env() {
        tracing::info!(url = %gateway.url, "Using HTTP gateway outbound channel");
        return Ok(Arc::new(HttpGateway::new(gateway)));
    }
    if let Some(smtp) = SmtpConfig::from_env() {
        tracing::info!(host = %smtp.smtp_host, "Using SMTP outbound channel");
        return Ok(Arc::new(SmtpChannel::new(smtp)));
    }
    anyhow::bail!("No outbound channel configured: set GATEWAY_URL or SMTP_HOST")
}
