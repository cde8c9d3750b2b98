//! Target resolution: audience filter -> pending target rows.

use herald_db::models::campaign::Campaign;
use herald_db::repositories::{CampaignRepo, RecipientRepo, TargetRepo};
use herald_db::DbPool;

use crate::error::EngineError;

/// Turns a campaign's audience filter into concrete target rows.
pub struct TargetResolver;

impl TargetResolver {
    /// Resolve the campaign's audience and create pending targets.
    ///
    /// Idempotent: recipients already targeted by this campaign are left
    /// untouched (the unique constraint turns duplicates into no-ops), so
    /// re-resolving only adds newly-matching recipients. Updates
    /// `campaign.total_targets` and returns the resulting target count.
    pub async fn resolve(pool: &DbPool, campaign: &Campaign) -> Result<i64, EngineError> {
        let filter = campaign.audience_filter()?;
        // Defensive re-validation; the filter was validated at save time.
        filter.validate_filter()?;

        let recipients = RecipientRepo::find_eligible(pool, &filter).await?;
        let inserted = TargetRepo::insert_pending_batch(pool, campaign.id, &recipients).await?;
        let total = TargetRepo::count_for_campaign(pool, campaign.id).await?;
        CampaignRepo::set_total_targets(pool, campaign.id, total as i32).await?;

        tracing::info!(
            campaign_id = campaign.id,
            eligible = recipients.len(),
            inserted,
            total,
            "Audience resolved",
        );
        Ok(total)
    }
}
