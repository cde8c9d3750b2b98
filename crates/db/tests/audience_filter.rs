//! Integration tests for audience-filter evaluation against the directory.

use sqlx::PgPool;

use herald_core::AudienceFilter;
use herald_db::models::recipient::CreateRecipient;
use herald_db::repositories::RecipientRepo;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn seed_directory(pool: &PgPool) {
    // A small cross-section of the directory.
    let rows = [
        CreateRecipient {
            language: "de".to_string(),
            formal_address: true,
            onboarding_completed: true,
            notification_interval_hours: Some(24),
            ..CreateRecipient::new("berlin-formal")
        },
        CreateRecipient {
            language: "de".to_string(),
            formal_address: false,
            onboarding_completed: true,
            ..CreateRecipient::new("berlin-informal")
        },
        CreateRecipient {
            language: "en".to_string(),
            timezone: "America/New_York".to_string(),
            onboarding_completed: false,
            ..CreateRecipient::new("nyc")
        },
        CreateRecipient {
            language: "fr".to_string(),
            notifications_enabled: false,
            ..CreateRecipient::new("paris-muted")
        },
    ];
    for row in &rows {
        RecipientRepo::create(pool, row).await.unwrap();
    }
}

async fn addresses(pool: &PgPool, filter: &AudienceFilter) -> Vec<String> {
    RecipientRepo::find_eligible(pool, filter)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.address)
        .collect()
}

// ---------------------------------------------------------------------------
// Filter clauses
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn default_filter_matches_everyone_not_blocked(pool: PgPool) {
    seed_directory(&pool).await;
    let found = addresses(&pool, &AudienceFilter::default()).await;
    assert_eq!(found.len(), 4);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn blocked_recipients_are_always_excluded(pool: PgPool) {
    seed_directory(&pool).await;
    let all = RecipientRepo::find_eligible(&pool, &AudienceFilter::default())
        .await
        .unwrap();
    RecipientRepo::set_blocked(&pool, all[0].id, true).await.unwrap();

    let found = addresses(&pool, &AudienceFilter::default()).await;
    assert_eq!(found.len(), 3);
    assert!(!found.contains(&all[0].address));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn language_allow_list_restricts_the_audience(pool: PgPool) {
    seed_directory(&pool).await;
    let filter = AudienceFilter {
        languages: Some(vec!["de".to_string()]),
        ..Default::default()
    };
    let found = addresses(&pool, &filter).await;
    assert_eq!(found, ["berlin-formal", "berlin-informal"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn formal_address_match_is_exact(pool: PgPool) {
    seed_directory(&pool).await;
    let filter = AudienceFilter {
        formal_address: Some(true),
        ..Default::default()
    };
    let found = addresses(&pool, &filter).await;
    assert_eq!(found, ["berlin-formal"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn onboarding_and_notification_requirements_conjoin(pool: PgPool) {
    seed_directory(&pool).await;
    let filter = AudienceFilter {
        require_onboarding_completed: true,
        require_notifications_enabled: true,
        ..Default::default()
    };
    let found = addresses(&pool, &filter).await;
    assert_eq!(found, ["berlin-formal", "berlin-informal"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn notification_interval_match_is_exact(pool: PgPool) {
    seed_directory(&pool).await;
    let filter = AudienceFilter {
        notification_interval_hours: Some(24),
        ..Default::default()
    };
    let found = addresses(&pool, &filter).await;
    assert_eq!(found, ["berlin-formal"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn default_timezone_only_excludes_other_zones(pool: PgPool) {
    seed_directory(&pool).await;
    let filter = AudienceFilter {
        default_timezone_only: true,
        ..Default::default()
    };
    let found = addresses(&pool, &filter).await;
    assert!(!found.contains(&"nyc".to_string()));
    assert_eq!(found.len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn min_inactive_days_matches_dormant_and_never_active(pool: PgPool) {
    seed_directory(&pool).await;
    let all = RecipientRepo::find_eligible(&pool, &AudienceFilter::default())
        .await
        .unwrap();
    // One recipient was active just now; the rest have never been active.
    RecipientRepo::touch_last_active(&pool, all[0].id).await.unwrap();

    let filter = AudienceFilter {
        min_inactive_days: Some(7),
        ..Default::default()
    };
    let found = addresses(&pool, &filter).await;
    assert_eq!(found.len(), 3);
    assert!(!found.contains(&all[0].address));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sendable_state_tracks_directory_changes(pool: PgPool) {
    seed_directory(&pool).await;
    let all = RecipientRepo::find_eligible(&pool, &AudienceFilter::default())
        .await
        .unwrap();
    let id = all[0].id;

    let state = RecipientRepo::sendable_state(&pool, id).await.unwrap().unwrap();
    assert!(!state.is_blocked);

    RecipientRepo::set_blocked(&pool, id, true).await.unwrap();
    let state = RecipientRepo::sendable_state(&pool, id).await.unwrap().unwrap();
    assert!(state.is_blocked);

    assert!(RecipientRepo::sendable_state(&pool, 999_999).await.unwrap().is_none());
}
