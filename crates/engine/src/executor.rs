//! Delivery executor: the concurrent claim/send/record loop.
//!
//! Each tick claims a batch of due targets — the claim UPDATE is the
//! rendered -> sending compare-and-set, so no target is ever processed by
//! two workers and an already-terminal target can never be re-attempted.
//! Claimed targets are delivered on a `JoinSet` bounded by a semaphore;
//! transient send errors retry with exponential backoff before being
//! demoted to permanent failures. Cancellation is cooperative: the loop
//! checks the token before every claim batch, and in-flight sends complete
//! and are recorded.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use herald_core::backoff::RetryPolicy;
use herald_core::state::skip_reason;
use herald_db::models::target::Target;
use herald_db::repositories::{CampaignRepo, RecipientRepo, TargetRepo};
use herald_db::DbPool;
use herald_events::{event_type, CampaignEvent, EventBus};
use herald_outbound::OutboundChannel;

use crate::error::EngineError;

/// Default polling interval for the claim loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of targets claimed per tick.
const DEFAULT_CLAIM_BATCH: i64 = 16;

/// Default bound on concurrent in-flight sends; keeps the executor inside
/// the outbound gateway's rate limit.
const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Tuning knobs for the delivery executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub poll_interval: Duration,
    pub claim_batch: i64,
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            claim_batch: DEFAULT_CLAIM_BATCH,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            retry: RetryPolicy::default(),
        }
    }
}

/// The long-lived dispatch loop consuming due targets.
pub struct DeliveryExecutor {
    pool: DbPool,
    channel: Arc<dyn OutboundChannel>,
    bus: Arc<EventBus>,
    config: ExecutorConfig,
    in_flight: Arc<Semaphore>,
}

impl DeliveryExecutor {
    /// Create a new executor.
    pub fn new(
        pool: DbPool,
        channel: Arc<dyn OutboundChannel>,
        bus: Arc<EventBus>,
        config: ExecutorConfig,
    ) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.max_in_flight));
        Self {
            pool,
            channel,
            bus,
            config,
            in_flight,
        }
    }

    /// Run the claim loop until the cancellation token is triggered.
    ///
    /// In-flight sends are drained before this returns, so every issued
    /// outbound call gets recorded.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        let mut tasks: JoinSet<()> = JoinSet::new();
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            claim_batch = self.config.claim_batch,
            max_in_flight = self.config.max_in_flight,
            "Delivery executor started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Delivery executor shutting down, draining in-flight sends");
                    break;
                }
                _ = ticker.tick() => {
                    while tasks.try_join_next().is_some() {}
                    if let Err(e) = self.tick(&mut tasks).await {
                        tracing::error!(error = %e, "Claim cycle failed");
                    }
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        tracing::info!("Delivery executor stopped");
    }

    /// Claim and process a single batch inline, without the polling loop.
    ///
    /// Processes targets sequentially and returns how many were claimed.
    /// Suitable for tick-style invocation and tests; production workers use
    /// [`run`](Self::run).
    pub async fn run_once(&self) -> Result<usize, EngineError> {
        let claimed = TargetRepo::claim_due(&self.pool, self.config.claim_batch).await?;
        let count = claimed.len();
        for target in claimed {
            deliver_one(
                &self.pool,
                self.channel.as_ref(),
                &self.bus,
                &self.config.retry,
                target,
            )
            .await?;
        }
        Ok(count)
    }

    /// One claim cycle: claim due targets and spawn a delivery task each.
    async fn tick(&self, tasks: &mut JoinSet<()>) -> Result<(), EngineError> {
        let claimed = TargetRepo::claim_due(&self.pool, self.config.claim_batch).await?;
        if claimed.is_empty() {
            return Ok(());
        }
        tracing::debug!(claimed = claimed.len(), "Claimed due targets");

        for target in claimed {
            let Ok(permit) = self.in_flight.clone().acquire_owned().await else {
                // The semaphore is never closed while the executor lives.
                break;
            };
            let pool = self.pool.clone();
            let channel = self.channel.clone();
            let bus = self.bus.clone();
            let retry = self.config.retry.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let target_id = target.id;
                if let Err(e) = deliver_one(&pool, channel.as_ref(), &bus, &retry, target).await {
                    tracing::error!(target_id, error = %e, "Delivery task failed");
                }
            });
        }
        Ok(())
    }
}

/// Deliver a single claimed target end to end.
async fn deliver_one(
    pool: &DbPool,
    channel: &dyn OutboundChannel,
    bus: &EventBus,
    retry: &RetryPolicy,
    target: Target,
) -> Result<(), EngineError> {
    let Some(campaign) = CampaignRepo::find_by_id(pool, target.campaign_id).await? else {
        // Campaign deleted under us; the cascade removed the target too.
        return Ok(());
    };

    // Hard cutoff: never record a send after not_after.
    if campaign.not_after.is_some_and(|cutoff| Utc::now() > cutoff) {
        record_skipped(pool, bus, &target, skip_reason::DEADLINE_EXCEEDED).await?;
        probe_completion(pool, bus, campaign.id).await?;
        return Ok(());
    }

    // Re-check eligibility against the live directory row; the snapshot is
    // only authoritative for rendering.
    let reason = match RecipientRepo::sendable_state(pool, target.recipient_id).await? {
        None => Err(skip_reason::RECIPIENT_BLOCKED),
        Some(s) if s.is_blocked => Err(skip_reason::RECIPIENT_BLOCKED),
        Some(s) if !s.notifications_enabled => Err(skip_reason::NOTIFICATIONS_DISABLED),
        Some(s) => Ok(s),
    };
    let sendable = match reason {
        Ok(s) => s,
        Err(reason) => {
            record_skipped(pool, bus, &target, reason).await?;
            probe_completion(pool, bus, campaign.id).await?;
            return Ok(());
        }
    };

    // Dry run: rehearse pacing and state transitions without deliveries.
    if campaign.test_mode {
        record_sent(pool, bus, &target, 0, true).await?;
        probe_completion(pool, bus, campaign.id).await?;
        return Ok(());
    }

    let Some(text) = target.rendered_text.as_deref() else {
        // Claim requires rendered status, so this only happens if rendering
        // was bypassed; record it as a permanent failure rather than wedge.
        record_failed(pool, bus, &target, 0, "missing rendered text").await?;
        probe_completion(pool, bus, campaign.id).await?;
        return Ok(());
    };

    let idempotency_key = Uuid::new_v4();
    let mut attempts: u32 = 0;
    loop {
        attempts += 1;
        match channel.send(&sendable.address, text, idempotency_key).await {
            Ok(()) => {
                record_sent(pool, bus, &target, attempts, false).await?;
                break;
            }
            Err(e) if e.is_transient() && retry.should_retry(attempts) => {
                let delay = retry.delay_before(attempts);
                tracing::warn!(
                    target_id = target.id,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient send failure, backing off",
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                record_failed(pool, bus, &target, attempts, &e.to_string()).await?;
                break;
            }
        }
    }

    probe_completion(pool, bus, campaign.id).await?;
    Ok(())
}

/// Record a successful (or dry-run) delivery and bump the campaign counter.
///
/// The counter only moves when the sending -> sent CAS actually applied,
/// which keeps the aggregate consistent even if the target was skipped
/// concurrently.
async fn record_sent(
    pool: &DbPool,
    bus: &EventBus,
    target: &Target,
    attempts: u32,
    dry_run: bool,
) -> Result<(), EngineError> {
    if TargetRepo::mark_sent(pool, target.id).await? {
        CampaignRepo::increment_sent(pool, target.campaign_id).await?;
        tracing::info!(target_id = target.id, attempts, dry_run, "Target delivered");
        bus.publish(
            CampaignEvent::new(event_type::TARGET_SENT, target.campaign_id)
                .with_target(target.id)
                .with_payload(serde_json::json!({
                    "attempts": attempts,
                    "dry_run": dry_run,
                })),
        );
    }
    Ok(())
}

/// Record a permanent delivery failure and bump the campaign counter.
async fn record_failed(
    pool: &DbPool,
    bus: &EventBus,
    target: &Target,
    attempts: u32,
    error: &str,
) -> Result<(), EngineError> {
    if TargetRepo::mark_failed(pool, target.id, error).await? {
        CampaignRepo::increment_failed(pool, target.campaign_id).await?;
        tracing::warn!(target_id = target.id, attempts, error, "Target failed permanently");
        bus.publish(
            CampaignEvent::new(event_type::TARGET_FAILED, target.campaign_id)
                .with_target(target.id)
                .with_payload(serde_json::json!({
                    "attempts": attempts,
                    "error": error,
                })),
        );
    }
    Ok(())
}

/// Record a skip. Skips are a non-error terminal outcome and do not touch
/// the sent/failed counters.
async fn record_skipped(
    pool: &DbPool,
    bus: &EventBus,
    target: &Target,
    reason: &str,
) -> Result<(), EngineError> {
    if TargetRepo::mark_skipped(pool, target.id, reason).await? {
        tracing::info!(target_id = target.id, reason, "Target skipped");
        bus.publish(
            CampaignEvent::new(event_type::TARGET_SKIPPED, target.campaign_id)
                .with_target(target.id)
                .with_payload(serde_json::json!({ "reason": reason })),
        );
    }
    Ok(())
}

/// Promote the campaign to done when its last target just went terminal.
async fn probe_completion(
    pool: &DbPool,
    bus: &EventBus,
    campaign_id: herald_core::types::DbId,
) -> Result<(), EngineError> {
    if CampaignRepo::complete_if_finished(pool, campaign_id).await? {
        tracing::info!(campaign_id, "Campaign finished");
        bus.publish(CampaignEvent::new(event_type::CAMPAIGN_DONE, campaign_id));
    }
    Ok(())
}
