//! Repository for the `targets` table.
//!
//! The rendered -> sending claim uses `FOR UPDATE SKIP LOCKED` so that two
//! executor workers can never hold the same target, and every terminal
//! transition is a compare-and-set on the expected source status: a target
//! that is already sent or failed can never be re-attempted.

use sqlx::PgPool;

use herald_core::types::{DbId, Timestamp};

use crate::models::recipient::RecipientSnapshot;
use crate::models::status::{CampaignStatus, TargetStatus};
use crate::models::target::{ScheduleRow, StatusCount, Target};

/// Column list for `targets` queries.
const COLUMNS: &str = "\
    id, campaign_id, recipient_id, language, formal_address, \
    planned_send_at, rendered_text, status_id, error, skip_reason, sent_at, \
    last_activity_triggered_at, activity_send_count, created_at, updated_at";

/// Provides target creation, the delivery claim, and status transitions.
pub struct TargetRepo;

impl TargetRepo {
    /// Insert pending targets for a batch of resolved recipients,
    /// snapshotting language and formal-address preference.
    ///
    /// Re-resolving is idempotent: the `(campaign_id, recipient_id)` unique
    /// constraint turns duplicates into no-ops via `ON CONFLICT DO NOTHING`.
    /// Returns the number of rows actually inserted.
    pub async fn insert_pending_batch(
        pool: &PgPool,
        campaign_id: DbId,
        recipients: &[RecipientSnapshot],
    ) -> Result<u64, sqlx::Error> {
        if recipients.is_empty() {
            return Ok(0);
        }

        let ids: Vec<DbId> = recipients.iter().map(|r| r.id).collect();
        let languages: Vec<String> = recipients.iter().map(|r| r.language.clone()).collect();
        let formal: Vec<bool> = recipients.iter().map(|r| r.formal_address).collect();

        let result = sqlx::query(
            "INSERT INTO targets (campaign_id, recipient_id, language, formal_address) \
             SELECT $1, u.recipient_id, u.language, u.formal_address \
             FROM UNNEST($2::BIGINT[], $3::TEXT[], $4::BOOLEAN[]) \
                 AS u(recipient_id, language, formal_address) \
             ON CONFLICT (campaign_id, recipient_id) DO NOTHING",
        )
        .bind(campaign_id)
        .bind(&ids)
        .bind(&languages)
        .bind(&formal)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Find a target by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Target>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM targets WHERE id = $1");
        sqlx::query_as::<_, Target>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all targets of a campaign (delivery report detail view).
    pub async fn list_for_campaign(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<Target>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM targets WHERE campaign_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, Target>(&query)
            .bind(campaign_id)
            .fetch_all(pool)
            .await
    }

    /// List the campaign's targets still awaiting rendering.
    pub async fn list_pending(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<Target>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM targets \
             WHERE campaign_id = $1 AND status_id = $2 \
             ORDER BY id"
        );
        sqlx::query_as::<_, Target>(&query)
            .bind(campaign_id)
            .bind(TargetStatus::Pending.id())
            .fetch_all(pool)
            .await
    }

    /// Total number of targets for a campaign.
    pub async fn count_for_campaign(pool: &PgPool, campaign_id: DbId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT COUNT(*) FROM targets WHERE campaign_id = $1")
                .bind(campaign_id)
                .fetch_one(pool)
                .await?;
        Ok(count.unwrap_or(0))
    }

    /// Number of targets not yet in a terminal status.
    pub async fn open_count(pool: &PgPool, campaign_id: DbId) -> Result<i64, sqlx::Error> {
        let count: Option<i64> = sqlx::query_scalar(
            "SELECT COUNT(*) FROM targets \
             WHERE campaign_id = $1 AND status_id IN ($2, $3, $4)",
        )
        .bind(campaign_id)
        .bind(TargetStatus::Pending.id())
        .bind(TargetStatus::Rendered.id())
        .bind(TargetStatus::Sending.id())
        .fetch_one(pool)
        .await?;
        Ok(count.unwrap_or(0))
    }

    /// Per-status tally for the delivery report.
    pub async fn status_counts(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<StatusCount>, sqlx::Error> {
        sqlx::query_as::<_, StatusCount>(
            "SELECT status_id, COUNT(*) AS count FROM targets \
             WHERE campaign_id = $1 \
             GROUP BY status_id \
             ORDER BY status_id",
        )
        .bind(campaign_id)
        .fetch_all(pool)
        .await
    }

    /// Store rendered text, advancing pending -> rendered.
    ///
    /// Returns `false` when the target was not in pending (already rendered
    /// or skipped meanwhile).
    pub async fn store_rendered(
        pool: &PgPool,
        id: DbId,
        rendered_text: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets SET rendered_text = $2, status_id = $3 \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(rendered_text)
        .bind(TargetStatus::Rendered.id())
        .bind(TargetStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Rendered targets of a campaign joined with the recipient's current
    /// timezone and active-hours window, for the scheduler's planning pass.
    pub async fn list_for_scheduling(
        pool: &PgPool,
        campaign_id: DbId,
    ) -> Result<Vec<ScheduleRow>, sqlx::Error> {
        sqlx::query_as::<_, ScheduleRow>(
            "SELECT t.id AS target_id, r.timezone, \
                    r.active_hours_start, r.active_hours_end \
             FROM targets t \
             JOIN recipients r ON r.id = t.recipient_id \
             WHERE t.campaign_id = $1 AND t.status_id = $2 \
             ORDER BY t.id",
        )
        .bind(campaign_id)
        .bind(TargetStatus::Rendered.id())
        .fetch_all(pool)
        .await
    }

    /// Record the planned send instant computed by the scheduler.
    pub async fn set_planned(
        pool: &PgPool,
        id: DbId,
        planned_send_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets SET planned_send_at = $2 \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(planned_send_at)
        .bind(TargetStatus::Rendered.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically claim up to `limit` due targets, moving them
    /// rendered -> sending.
    ///
    /// A target is due when it is rendered, its planned instant has passed,
    /// and its campaign is in sending. `FOR UPDATE SKIP LOCKED` prevents
    /// double-dispatch when multiple executor instances are running.
    pub async fn claim_due(pool: &PgPool, limit: i64) -> Result<Vec<Target>, sqlx::Error> {
        let query = format!(
            "UPDATE targets SET status_id = $1 \
             WHERE id IN ( \
                 SELECT t.id FROM targets t \
                 JOIN campaigns c ON c.id = t.campaign_id \
                 WHERE t.status_id = $2 \
                   AND t.planned_send_at IS NOT NULL \
                   AND t.planned_send_at <= NOW() \
                   AND c.status_id = $3 \
                 ORDER BY t.planned_send_at ASC \
                 LIMIT $4 \
                 FOR UPDATE OF t SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Target>(&query)
            .bind(TargetStatus::Sending.id())
            .bind(TargetStatus::Rendered.id())
            .bind(CampaignStatus::Sending.id())
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Record a successful delivery, advancing sending -> sent.
    pub async fn mark_sent(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets SET status_id = $2, sent_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(TargetStatus::Sent.id())
        .bind(TargetStatus::Sending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record a permanent delivery failure, advancing sending -> failed.
    pub async fn mark_failed(pool: &PgPool, id: DbId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets SET status_id = $2, error = $3 \
             WHERE id = $1 AND status_id = $4",
        )
        .bind(id)
        .bind(TargetStatus::Failed.id())
        .bind(error)
        .bind(TargetStatus::Sending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Skip a single non-terminal target, recording the cause.
    pub async fn mark_skipped(
        pool: &PgPool,
        id: DbId,
        skip_reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets SET status_id = $2, skip_reason = $3 \
             WHERE id = $1 AND status_id IN ($4, $5, $6)",
        )
        .bind(id)
        .bind(TargetStatus::Skipped.id())
        .bind(skip_reason)
        .bind(TargetStatus::Pending.id())
        .bind(TargetStatus::Rendered.id())
        .bind(TargetStatus::Sending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Skip every still-open (pending/rendered) target of a campaign.
    ///
    /// In-flight (sending) targets are left alone: an outbound call already
    /// issued completes and is recorded by its worker.
    pub async fn skip_remaining(
        pool: &PgPool,
        campaign_id: DbId,
        skip_reason: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets SET status_id = $2, skip_reason = $3 \
             WHERE campaign_id = $1 AND status_id IN ($4, $5)",
        )
        .bind(campaign_id)
        .bind(TargetStatus::Skipped.id())
        .bind(skip_reason)
        .bind(TargetStatus::Pending.id())
        .bind(TargetStatus::Rendered.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Skip open targets whose delivery cutoff has passed: either the
    /// campaign's `not_after`, or the end of its delivery window plus
    /// `grace_secs`. Returns the number of targets skipped.
    pub async fn sweep_deadline_exceeded(
        pool: &PgPool,
        grace_secs: f64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets t SET status_id = $1, skip_reason = $2 \
             FROM campaigns c \
             WHERE c.id = t.campaign_id \
               AND t.status_id IN ($3, $4) \
               AND c.status_id IN ($5, $6) \
               AND ( \
                   (c.not_after IS NOT NULL AND c.not_after < NOW()) \
                   OR (c.scheduled_at IS NOT NULL \
                       AND c.scheduled_at \
                           + make_interval(hours => c.within_hours) \
                           + make_interval(secs => $7) < NOW()) \
               )",
        )
        .bind(TargetStatus::Skipped.id())
        .bind(herald_core::state::skip_reason::DEADLINE_EXCEEDED)
        .bind(TargetStatus::Pending.id())
        .bind(TargetStatus::Rendered.id())
        .bind(CampaignStatus::Scheduled.id())
        .bind(CampaignStatus::Sending.id())
        .bind(grace_secs)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Pull the recipient's open targets forward after a qualifying
    /// activity.
    ///
    /// Only applies while the campaign window is open, only when the target
    /// is below the activity-send cap, and never delays a
    /// target (the planned instant only moves if it lies in the future).
    /// Each affected row gets `last_activity_triggered_at` stamped and
    /// `activity_send_count` bumped exactly once.
    pub async fn replan_for_activity(
        pool: &PgPool,
        recipient_id: DbId,
        max_activity_sends: i32,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE targets t SET \
                 planned_send_at = NOW(), \
                 last_activity_triggered_at = NOW(), \
                 activity_send_count = t.activity_send_count + 1 \
             FROM campaigns c \
             WHERE c.id = t.campaign_id \
               AND t.recipient_id = $1 \
               AND t.status_id IN ($2, $3) \
               AND c.status_id IN ($4, $5) \
               AND t.activity_send_count < $6 \
               AND (t.planned_send_at IS NULL OR t.planned_send_at > NOW())",
        )
        .bind(recipient_id)
        .bind(TargetStatus::Pending.id())
        .bind(TargetStatus::Rendered.id())
        .bind(CampaignStatus::Scheduled.id())
        .bind(CampaignStatus::Sending.id())
        .bind(max_activity_sends)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
