//! Campaign lifecycle service.
//!
//! The operation set the (external) admin surface calls:
//! create/update/preview/schedule/start/cancel plus the delivery report and
//! the activity-trigger entry point. Every transition goes through the
//! guarded repository updates; target rows are never mutated here directly.

use std::sync::Arc;

use herald_core::state::{campaign as campaign_state, skip_reason};
use herald_core::types::DbId;
use herald_core::CoreError;
use herald_db::models::campaign::{Campaign, CampaignListQuery, CreateCampaign, UpdateCampaign};
use herald_db::models::status::{CampaignStatus, TargetStatus};
use herald_db::repositories::{CampaignRepo, RecipientRepo, TargetRepo};
use herald_db::DbPool;
use herald_events::{event_type, CampaignEvent, EventBus};
use serde::Serialize;

use crate::error::EngineError;
use crate::renderer::{RenderDriver, RenderOutcome};
use crate::resolver::TargetResolver;
use crate::scheduler::{DeliveryScheduler, PlanOutcome};

/// Campaign-level progress snapshot for the admin surface.
///
/// Reads only committed rows, so it never blocks on in-flight work; the
/// counters are eventually consistent, stale by at most one delivery
/// attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub campaign_id: DbId,
    pub status: &'static str,
    pub total_targets: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub pending_count: i64,
    pub rendered_count: i64,
    pub in_flight_count: i64,
    pub skipped_count: i64,
}

impl DeliveryReport {
    /// Targets that have not reached a terminal status yet.
    pub fn remaining(&self) -> i64 {
        self.pending_count + self.rendered_count + self.in_flight_count
    }
}

/// Facade over the campaign lifecycle.
pub struct CampaignService {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl CampaignService {
    /// Create a new service handle.
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Save a new draft campaign. The audience filter is validated here,
    /// once, at save time.
    pub async fn create(&self, input: CreateCampaign) -> Result<Campaign, EngineError> {
        input.filter.validate_filter()?;
        if input.within_hours <= 0 {
            return Err(CoreError::Validation(
                "within_hours must be positive".to_string(),
            )
            .into());
        }
        let campaign = CampaignRepo::create(&self.pool, &input).await?;
        tracing::info!(campaign_id = campaign.id, tone = %campaign.tone, "Campaign created");
        Ok(campaign)
    }

    /// Patch a campaign that is still in draft.
    pub async fn update(
        &self,
        id: DbId,
        input: UpdateCampaign,
    ) -> Result<Campaign, EngineError> {
        if let Some(filter) = &input.filter {
            filter.validate_filter()?;
        }
        if input.within_hours.is_some_and(|h| h <= 0) {
            return Err(CoreError::Validation(
                "within_hours must be positive".to_string(),
            )
            .into());
        }
        match CampaignRepo::update_draft(&self.pool, id, &input).await? {
            Some(campaign) => Ok(campaign),
            None => match CampaignRepo::find_by_id(&self.pool, id).await? {
                Some(campaign) => Err(CoreError::Conflict(format!(
                    "campaign is {}; only draft campaigns can be edited",
                    campaign_state::status_name(campaign.status_id),
                ))
                .into()),
                None => Err(CoreError::NotFound {
                    entity: "campaign",
                    id,
                }
                .into()),
            },
        }
    }

    /// Fetch a campaign or a typed not-found error.
    pub async fn get(&self, id: DbId) -> Result<Campaign, EngineError> {
        CampaignRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "campaign",
                    id,
                }
                .into()
            })
    }

    /// List campaigns for the admin overview.
    pub async fn list(&self, query: &CampaignListQuery) -> Result<Vec<Campaign>, EngineError> {
        Ok(CampaignRepo::list(&self.pool, query).await?)
    }

    /// draft -> preview: resolve the audience and bulk-render all targets.
    ///
    /// Resolution is idempotent, so re-running a failed preview picks up
    /// where it left off.
    pub async fn preview(&self, id: DbId) -> Result<RenderOutcome, EngineError> {
        let campaign = self.get(id).await?;
        if campaign.status_id != CampaignStatus::Draft.id() {
            return Err(self.transition_error(id, CampaignStatus::Preview).await);
        }

        TargetResolver::resolve(&self.pool, &campaign).await?;
        let outcome = RenderDriver::render_campaign(&self.pool, &campaign).await?;

        if !CampaignRepo::mark_preview(&self.pool, id).await? {
            return Err(self.transition_error(id, CampaignStatus::Preview).await);
        }
        self.bus.publish(
            CampaignEvent::new(event_type::CAMPAIGN_PREVIEW, id).with_payload(
                serde_json::json!({
                    "rendered": outcome.rendered,
                    "skipped": outcome.skipped,
                }),
            ),
        );
        Ok(outcome)
    }

    /// preview -> scheduled: compute every target's planned send instant.
    pub async fn schedule(&self, id: DbId) -> Result<PlanOutcome, EngineError> {
        if !CampaignRepo::mark_scheduled(&self.pool, id).await? {
            return Err(self.transition_error(id, CampaignStatus::Scheduled).await);
        }
        let campaign = self.get(id).await?;
        let outcome = DeliveryScheduler::plan(&self.pool, &campaign).await?;
        self.bus.publish(
            CampaignEvent::new(event_type::CAMPAIGN_SCHEDULED, id).with_payload(
                serde_json::json!({
                    "planned": outcome.planned,
                    "skipped": outcome.skipped,
                }),
            ),
        );
        Ok(outcome)
    }

    /// scheduled -> sending: authorize the executor to claim due targets.
    pub async fn start(&self, id: DbId) -> Result<(), EngineError> {
        if !CampaignRepo::mark_sending(&self.pool, id).await? {
            return Err(self.transition_error(id, CampaignStatus::Sending).await);
        }
        tracing::info!(campaign_id = id, "Campaign delivery started");
        self.bus
            .publish(CampaignEvent::new(event_type::CAMPAIGN_STARTED, id));
        Ok(())
    }

    /// Cancel from any non-terminal state.
    ///
    /// Remaining open targets are skipped immediately; in-flight sends
    /// complete and are recorded by their workers. Returns the number of
    /// targets skipped.
    pub async fn cancel(&self, id: DbId) -> Result<u64, EngineError> {
        // Surface not-found distinctly from already-terminal.
        let _ = self.get(id).await?;
        if !CampaignRepo::cancel(&self.pool, id).await? {
            return Err(self.transition_error(id, CampaignStatus::Cancelled).await);
        }
        let skipped =
            TargetRepo::skip_remaining(&self.pool, id, skip_reason::CAMPAIGN_CANCELLED).await?;
        tracing::info!(campaign_id = id, skipped, "Campaign cancelled");
        self.bus.publish(
            CampaignEvent::new(event_type::CAMPAIGN_CANCELLED, id)
                .with_payload(serde_json::json!({ "skipped": skipped })),
        );
        Ok(skipped)
    }

    /// Record a qualifying recipient activity: stamps the directory row and
    /// pulls the recipient's open targets forward.
    pub async fn record_activity(&self, recipient_id: DbId) -> Result<u64, EngineError> {
        RecipientRepo::touch_last_active(&self.pool, recipient_id).await?;
        DeliveryScheduler::replan_on_activity(&self.pool, recipient_id).await
    }

    /// Target-level delivery detail for the admin surface (read-only).
    pub async fn target_report(
        &self,
        id: DbId,
    ) -> Result<Vec<herald_db::models::target::Target>, EngineError> {
        let _ = self.get(id).await?;
        Ok(TargetRepo::list_for_campaign(&self.pool, id).await?)
    }

    /// Build the campaign's delivery report.
    pub async fn delivery_report(&self, id: DbId) -> Result<DeliveryReport, EngineError> {
        let campaign = self.get(id).await?;
        let counts = TargetRepo::status_counts(&self.pool, id).await?;

        let count_for = |status: TargetStatus| {
            counts
                .iter()
                .find(|c| c.status_id == status.id())
                .map(|c| c.count)
                .unwrap_or(0)
        };

        Ok(DeliveryReport {
            campaign_id: campaign.id,
            status: campaign_state::status_name(campaign.status_id),
            total_targets: campaign.total_targets,
            sent_count: campaign.sent_count,
            failed_count: campaign.failed_count,
            pending_count: count_for(TargetStatus::Pending),
            rendered_count: count_for(TargetStatus::Rendered),
            in_flight_count: count_for(TargetStatus::Sending),
            skipped_count: count_for(TargetStatus::Skipped),
        })
    }

    /// Build a descriptive invalid-transition (or not-found) error from the
    /// campaign's current status.
    async fn transition_error(&self, id: DbId, to: CampaignStatus) -> EngineError {
        match CampaignRepo::find_by_id(&self.pool, id).await {
            Ok(Some(campaign)) => {
                let message = campaign_state::validate_transition(campaign.status_id, to.id())
                    .err()
                    .unwrap_or_else(|| {
                        format!(
                            "campaign {} -> {} lost a concurrent race",
                            campaign_state::status_name(campaign.status_id),
                            campaign_state::status_name(to.id()),
                        )
                    });
                CoreError::InvalidTransition(message).into()
            }
            Ok(None) => CoreError::NotFound {
                entity: "campaign",
                id,
            }
            .into(),
            Err(e) => e.into(),
        }
    }
}
