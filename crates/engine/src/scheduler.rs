//! Delivery scheduling: planned send instants, activity replans, and the
//! deadline sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use herald_core::types::DbId;
use herald_core::{active_hours, spread, state::skip_reason};
use herald_db::models::campaign::Campaign;
use herald_db::repositories::{CampaignRepo, TargetRepo};
use herald_db::DbPool;
use herald_events::{event_type, CampaignEvent, EventBus};

use crate::error::EngineError;

/// Upper bound on activity-triggered advances per target.
pub const MAX_ACTIVITY_SENDS: i32 = 3;

/// How often the deadline sweep runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// How long past its window a target may linger before the sweep skips it.
/// Covers executor downtime without leaving anything pending forever.
const DEADLINE_GRACE_SECS: f64 = 900.0;

/// Counts from one planning pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlanOutcome {
    pub planned: u64,
    pub skipped: u64,
}

/// Assigns send instants and keeps them honest against the deadline.
pub struct DeliveryScheduler;

impl DeliveryScheduler {
    /// Plan every rendered target of the campaign.
    ///
    /// Send times are spread evenly (with jitter) across
    /// `[now, now + within_hours)`, clipped to `not_after`, then shifted
    /// forward into each recipient's local active-hours window. A target
    /// whose shifted instant falls past `not_after` is skipped immediately
    /// as deadline-exceeded rather than planned into the void.
    pub async fn plan(pool: &DbPool, campaign: &Campaign) -> Result<PlanOutcome, EngineError> {
        let rows = TargetRepo::list_for_scheduling(pool, campaign.id).await?;
        let now = Utc::now();

        let mut window_secs = i64::from(campaign.within_hours) * 3600;
        if let Some(cutoff) = campaign.not_after {
            window_secs = window_secs.min((cutoff - now).num_seconds().max(0));
        }

        let instants = spread::spread_send_times(now, window_secs, rows.len());
        let mut outcome = PlanOutcome::default();

        for (row, instant) in rows.iter().zip(instants) {
            let tz = active_hours::parse_timezone(&row.timezone);
            let shifted = active_hours::next_active_instant(
                instant,
                tz,
                row.active_hours_start,
                row.active_hours_end,
            );

            let past_cutoff = campaign.not_after.is_some_and(|cutoff| shifted > cutoff);
            if past_cutoff {
                TargetRepo::mark_skipped(pool, row.target_id, skip_reason::DEADLINE_EXCEEDED)
                    .await?;
                outcome.skipped += 1;
            } else {
                TargetRepo::set_planned(pool, row.target_id, shifted).await?;
                outcome.planned += 1;
            }
        }

        tracing::info!(
            campaign_id = campaign.id,
            planned = outcome.planned,
            skipped = outcome.skipped,
            window_secs,
            "Delivery window planned",
        );
        Ok(outcome)
    }

    /// Pull the recipient's open targets forward after a qualifying
    /// activity. Never delays a target; bounded by [`MAX_ACTIVITY_SENDS`].
    /// Returns the number of targets advanced.
    pub async fn replan_on_activity(
        pool: &DbPool,
        recipient_id: DbId,
    ) -> Result<u64, EngineError> {
        let advanced =
            TargetRepo::replan_for_activity(pool, recipient_id, MAX_ACTIVITY_SENDS).await?;
        if advanced > 0 {
            tracing::debug!(recipient_id, advanced, "Activity trigger advanced targets");
        }
        Ok(advanced)
    }

    /// Run the periodic deadline sweep until `cancel` is triggered.
    ///
    /// Each tick skips open targets whose cutoff has elapsed and promotes
    /// sending campaigns whose targets are all terminal to `done`,
    /// publishing a completion event for each.
    pub async fn run_sweep(pool: DbPool, bus: Arc<EventBus>, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = SWEEP_INTERVAL.as_secs(),
            "Deadline sweep started"
        );

        let mut interval = tokio::time::interval(SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Deadline sweep stopping");
                    break;
                }
                _ = interval.tick() => {
                    match TargetRepo::sweep_deadline_exceeded(&pool, DEADLINE_GRACE_SECS).await {
                        Ok(skipped) if skipped > 0 => {
                            tracing::info!(skipped, "Deadline sweep: skipped overdue targets");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "Deadline sweep failed");
                        }
                    }

                    match CampaignRepo::complete_finished(&pool).await {
                        Ok(completed) => {
                            for campaign_id in completed {
                                tracing::info!(campaign_id, "Campaign finished");
                                bus.publish(CampaignEvent::new(
                                    event_type::CAMPAIGN_DONE,
                                    campaign_id,
                                ));
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Campaign completion sweep failed");
                        }
                    }
                }
            }
        }
    }
}
