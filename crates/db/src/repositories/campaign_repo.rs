//! Repository for the `campaigns` table.
//!
//! Every status transition is a guarded UPDATE (`WHERE status_id = $from`),
//! so a lost race surfaces as zero rows affected rather than a corrupted
//! state. Aggregate counters are only ever mutated with atomic increments.

use sqlx::PgPool;

use herald_core::types::DbId;

use crate::models::campaign::{Campaign, CampaignListQuery, CreateCampaign, UpdateCampaign};
use crate::models::status::{CampaignStatus, TargetStatus};

/// Column list for `campaigns` queries.
const COLUMNS: &str = "\
    id, draft_text, topic, tone, filter, test_mode, within_hours, not_after, \
    status_id, total_targets, sent_count, failed_count, \
    scheduled_at, started_at, completed_at, created_at, updated_at";

/// Maximum page size for campaign listing.
const MAX_LIMIT: i64 = 100;

/// Default page size for campaign listing.
const DEFAULT_LIMIT: i64 = 50;

/// Provides CRUD operations and guarded lifecycle transitions for campaigns.
pub struct CampaignRepo;

impl CampaignRepo {
    /// Create a new campaign in `draft` status.
    ///
    /// The audience filter must already be validated; this method only
    /// serializes it.
    pub async fn create(pool: &PgPool, input: &CreateCampaign) -> Result<Campaign, sqlx::Error> {
        let filter = serde_json::to_value(&input.filter)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        let query = format!(
            "INSERT INTO campaigns \
                 (draft_text, topic, tone, filter, test_mode, within_hours, not_after) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(&input.draft_text)
            .bind(&input.topic)
            .bind(input.tone.as_str())
            .bind(&filter)
            .bind(input.test_mode)
            .bind(input.within_hours)
            .bind(input.not_after)
            .fetch_one(pool)
            .await
    }

    /// Find a campaign by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Campaign>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM campaigns WHERE id = $1");
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List campaigns with optional status filter and pagination.
    pub async fn list(
        pool: &PgPool,
        params: &CampaignListQuery,
    ) -> Result<Vec<Campaign>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = params.offset.unwrap_or(0);

        let where_clause = if params.status_id.is_some() {
            "WHERE status_id = $3"
        } else {
            ""
        };
        let query = format!(
            "SELECT {COLUMNS} FROM campaigns \
             {where_clause} \
             ORDER BY created_at DESC \
             LIMIT $1 OFFSET $2"
        );

        let mut q = sqlx::query_as::<_, Campaign>(&query).bind(limit).bind(offset);
        if let Some(status_id) = params.status_id {
            q = q.bind(status_id);
        }
        q.fetch_all(pool).await
    }

    /// Patch a campaign that is still in `draft` status.
    ///
    /// Returns `None` when the campaign does not exist or already left draft.
    pub async fn update_draft(
        pool: &PgPool,
        id: DbId,
        input: &UpdateCampaign,
    ) -> Result<Option<Campaign>, sqlx::Error> {
        let filter = match &input.filter {
            Some(f) => {
                Some(serde_json::to_value(f).map_err(|e| sqlx::Error::Encode(Box::new(e)))?)
            }
            None => None,
        };
        let query = format!(
            "UPDATE campaigns SET \
                 draft_text = COALESCE($2, draft_text), \
                 topic = COALESCE($3, topic), \
                 tone = COALESCE($4, tone), \
                 filter = COALESCE($5, filter), \
                 test_mode = COALESCE($6, test_mode), \
                 within_hours = COALESCE($7, within_hours), \
                 not_after = COALESCE($8, not_after) \
             WHERE id = $1 AND status_id = $9 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Campaign>(&query)
            .bind(id)
            .bind(&input.draft_text)
            .bind(&input.topic)
            .bind(input.tone.map(|t| t.as_str()))
            .bind(&filter)
            .bind(input.test_mode)
            .bind(input.within_hours)
            .bind(input.not_after)
            .bind(CampaignStatus::Draft.id())
            .fetch_optional(pool)
            .await
    }

    /// Guarded draft -> preview transition.
    pub async fn mark_preview(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::transition(pool, id, CampaignStatus::Draft, CampaignStatus::Preview, "").await
    }

    /// Guarded preview -> scheduled transition; stamps `scheduled_at`.
    pub async fn mark_scheduled(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::transition(
            pool,
            id,
            CampaignStatus::Preview,
            CampaignStatus::Scheduled,
            ", scheduled_at = NOW()",
        )
        .await
    }

    /// Guarded scheduled -> sending transition; stamps `started_at`.
    pub async fn mark_sending(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::transition(
            pool,
            id,
            CampaignStatus::Scheduled,
            CampaignStatus::Sending,
            ", started_at = NOW()",
        )
        .await
    }

    async fn transition(
        pool: &PgPool,
        id: DbId,
        from: CampaignStatus,
        to: CampaignStatus,
        extra_set: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE campaigns SET status_id = $2{extra_set} \
             WHERE id = $1 AND status_id = $3"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(to.id())
            .bind(from.id())
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Promote a sending campaign to `done` iff no non-terminal target
    /// remains; stamps `completed_at`. Returns `true` when promoted.
    pub async fn complete_if_finished(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id = $3 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM targets \
                   WHERE campaign_id = $1 AND status_id NOT IN ($4, $5, $6) \
               )",
        )
        .bind(id)
        .bind(CampaignStatus::Done.id())
        .bind(CampaignStatus::Sending.id())
        .bind(TargetStatus::Sent.id())
        .bind(TargetStatus::Failed.id())
        .bind(TargetStatus::Skipped.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Sweep every sending campaign whose targets are all terminal into
    /// `done`. Returns the promoted campaign IDs.
    pub async fn complete_finished(pool: &PgPool) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE campaigns c SET status_id = $1, completed_at = NOW() \
             WHERE c.status_id = $2 \
               AND NOT EXISTS ( \
                   SELECT 1 FROM targets t \
                   WHERE t.campaign_id = c.id AND t.status_id NOT IN ($3, $4, $5) \
               ) \
             RETURNING c.id",
        )
        .bind(CampaignStatus::Done.id())
        .bind(CampaignStatus::Sending.id())
        .bind(TargetStatus::Sent.id())
        .bind(TargetStatus::Failed.id())
        .bind(TargetStatus::Skipped.id())
        .fetch_all(pool)
        .await
    }

    /// Cancel a campaign if it is not already in a terminal state.
    ///
    /// Returns `true` if the campaign was cancelled, `false` if it was
    /// already done or cancelled. Open targets are skipped separately by
    /// the caller via `TargetRepo::skip_remaining`.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE campaigns SET status_id = $2, completed_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($2, $3)",
        )
        .bind(id)
        .bind(CampaignStatus::Cancelled.id())
        .bind(CampaignStatus::Done.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record the resolved audience size.
    pub async fn set_total_targets(
        pool: &PgPool,
        id: DbId,
        total: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE campaigns SET total_targets = $2 WHERE id = $1")
            .bind(id)
            .bind(total)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Atomically bump `sent_count` after a successful delivery.
    pub async fn increment_sent(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE campaigns SET sent_count = sent_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Atomically bump `failed_count` after a permanent delivery failure.
    pub async fn increment_failed(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE campaigns SET failed_count = failed_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete a campaign and (by cascade) all of its targets and events.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM campaigns WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
