//! Repository for the `recipients` table.
//!
//! `find_eligible` evaluates a campaign's audience filter as a single SQL
//! conjunction; the write helpers exist for the surrounding bot/admin
//! plumbing and for integration tests.

use sqlx::PgPool;

use herald_core::filter::{AudienceFilter, DEFAULT_TIMEZONE};
use herald_core::types::DbId;

use crate::models::recipient::{CreateRecipient, Recipient, RecipientSnapshot, SendableState};

/// Column list for `recipients` queries.
const COLUMNS: &str = "\
    id, address, language, formal_address, timezone, \
    active_hours_start, active_hours_end, notifications_enabled, \
    onboarding_completed, notification_interval_hours, last_active_at, \
    is_blocked, created_at, updated_at";

/// Column list for resolver snapshots.
const SNAPSHOT_COLUMNS: &str = "\
    id, address, language, formal_address, timezone, \
    active_hours_start, active_hours_end, notifications_enabled, \
    onboarding_completed, last_active_at, is_blocked";

/// Provides directory queries for the resolver and executor.
pub struct RecipientRepo;

impl RecipientRepo {
    /// Create a recipient row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateRecipient,
    ) -> Result<Recipient, sqlx::Error> {
        let query = format!(
            "INSERT INTO recipients \
                 (address, language, formal_address, timezone, \
                  active_hours_start, active_hours_end, notifications_enabled, \
                  onboarding_completed, notification_interval_hours) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Recipient>(&query)
            .bind(&input.address)
            .bind(&input.language)
            .bind(input.formal_address)
            .bind(&input.timezone)
            .bind(input.active_hours_start)
            .bind(input.active_hours_end)
            .bind(input.notifications_enabled)
            .bind(input.onboarding_completed)
            .bind(input.notification_interval_hours)
            .fetch_one(pool)
            .await
    }

    /// Find a recipient by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Recipient>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM recipients WHERE id = $1");
        sqlx::query_as::<_, Recipient>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Evaluate an audience filter against the directory.
    ///
    /// Builds the WHERE conjunction dynamically and tracks the next bind
    /// parameter index; the filter must already be validated.
    pub async fn find_eligible(
        pool: &PgPool,
        filter: &AudienceFilter,
    ) -> Result<Vec<RecipientSnapshot>, sqlx::Error> {
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if filter.exclude_blocked {
            conditions.push("is_blocked = FALSE".to_string());
        }
        if filter.require_notifications_enabled {
            conditions.push("notifications_enabled = TRUE".to_string());
        }
        if filter.require_onboarding_completed {
            conditions.push("onboarding_completed = TRUE".to_string());
        }
        if filter.default_timezone_only {
            conditions.push(format!("timezone = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.formal_address.is_some() {
            conditions.push(format!("formal_address = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.languages.is_some() {
            conditions.push(format!("language = ANY(${bind_idx})"));
            bind_idx += 1;
        }
        if filter.notification_interval_hours.is_some() {
            conditions.push(format!("notification_interval_hours = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.min_inactive_days.is_some() {
            conditions.push(format!(
                "(last_active_at IS NULL \
                  OR last_active_at <= NOW() - make_interval(days => ${bind_idx}))"
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        let query = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM recipients {where_clause} ORDER BY id"
        );

        let mut q = sqlx::query_as::<_, RecipientSnapshot>(&query);
        if filter.default_timezone_only {
            q = q.bind(DEFAULT_TIMEZONE);
        }
        if let Some(formal) = filter.formal_address {
            q = q.bind(formal);
        }
        if let Some(languages) = &filter.languages {
            q = q.bind(languages);
        }
        if let Some(interval) = filter.notification_interval_hours {
            q = q.bind(interval);
        }
        if let Some(days) = filter.min_inactive_days {
            q = q.bind(days);
        }

        q.fetch_all(pool).await
    }

    /// Live eligibility re-check used by the executor immediately before a
    /// send.
    pub async fn sendable_state(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<SendableState>, sqlx::Error> {
        sqlx::query_as::<_, SendableState>(
            "SELECT address, is_blocked, notifications_enabled \
             FROM recipients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Block or unblock a recipient.
    pub async fn set_blocked(pool: &PgPool, id: DbId, blocked: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE recipients SET is_blocked = $2 WHERE id = $1")
            .bind(id)
            .bind(blocked)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Toggle the notifications opt-in.
    pub async fn set_notifications_enabled(
        pool: &PgPool,
        id: DbId,
        enabled: bool,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE recipients SET notifications_enabled = $2 WHERE id = $1")
                .bind(id)
                .bind(enabled)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stamp `last_active_at` when the recipient performs an activity.
    pub async fn touch_last_active(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE recipients SET last_active_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
