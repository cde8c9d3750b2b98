//! Repository for the `campaign_events` table.

use sqlx::PgPool;

use herald_core::types::DbId;

use crate::models::event::CampaignEventRow;

/// Column list for `campaign_events` queries.
const COLUMNS: &str = "id, campaign_id, target_id, event_type, payload, created_at";

/// Default page size for event listing.
const DEFAULT_LIMIT: i64 = 100;

/// Append-only access to the durable campaign event log.
pub struct EventRepo;

impl EventRepo {
    /// Append an event, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        campaign_id: DbId,
        target_id: Option<DbId>,
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO campaign_events (campaign_id, target_id, event_type, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(campaign_id)
        .bind(target_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(pool)
        .await
    }

    /// List a campaign's events, newest first.
    pub async fn list_for_campaign(
        pool: &PgPool,
        campaign_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<CampaignEventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM campaign_events \
             WHERE campaign_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, CampaignEventRow>(&query)
            .bind(campaign_id)
            .bind(limit.unwrap_or(DEFAULT_LIMIT))
            .fetch_all(pool)
            .await
    }
}
