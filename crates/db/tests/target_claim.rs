//! Integration tests for target creation, the delivery claim, and the
//! terminal compare-and-set transitions.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use herald_core::state::skip_reason;
use herald_core::{AudienceFilter, Tone};
use herald_db::models::campaign::{Campaign, CreateCampaign};
use herald_db::models::recipient::{CreateRecipient, RecipientSnapshot};
use herald_db::models::status::TargetStatus;
use herald_db::repositories::{CampaignRepo, RecipientRepo, TargetRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_campaign(draft: &str) -> CreateCampaign {
    CreateCampaign {
        draft_text: draft.to_string(),
        topic: None,
        tone: Tone::Short,
        filter: AudienceFilter::default(),
        test_mode: false,
        within_hours: 24,
        not_after: None,
    }
}

async fn seed_snapshots(pool: &PgPool, count: usize) -> Vec<RecipientSnapshot> {
    let mut snapshots = Vec::with_capacity(count);
    for i in 0..count {
        let r = RecipientRepo::create(pool, &CreateRecipient::new(format!("chat-{i}")))
            .await
            .unwrap();
        snapshots.push(RecipientSnapshot {
            id: r.id,
            address: r.address,
            language: r.language,
            formal_address: r.formal_address,
            timezone: r.timezone,
            active_hours_start: r.active_hours_start,
            active_hours_end: r.active_hours_end,
            notifications_enabled: r.notifications_enabled,
            onboarding_completed: r.onboarding_completed,
            last_active_at: r.last_active_at,
            is_blocked: r.is_blocked,
        });
    }
    snapshots
}

/// Create a campaign in sending status with `count` rendered targets whose
/// planned instants are already due.
async fn sending_campaign_with_due_targets(pool: &PgPool, count: usize) -> Campaign {
    let campaign = CampaignRepo::create(pool, &new_campaign("due")).await.unwrap();
    let snapshots = seed_snapshots(pool, count).await;
    TargetRepo::insert_pending_batch(pool, campaign.id, &snapshots)
        .await
        .unwrap();

    for target in TargetRepo::list_pending(pool, campaign.id).await.unwrap() {
        assert!(TargetRepo::store_rendered(pool, target.id, "text").await.unwrap());
        assert!(
            TargetRepo::set_planned(pool, target.id, Utc::now() - Duration::minutes(1))
                .await
                .unwrap()
        );
    }

    CampaignRepo::mark_preview(pool, campaign.id).await.unwrap();
    CampaignRepo::mark_scheduled(pool, campaign.id).await.unwrap();
    CampaignRepo::mark_sending(pool, campaign.id).await.unwrap();
    campaign
}

// ---------------------------------------------------------------------------
// Resolution idempotency and uniqueness
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn re_inserting_the_same_audience_is_a_noop(pool: PgPool) {
    let campaign = CampaignRepo::create(&pool, &new_campaign("text")).await.unwrap();
    let snapshots = seed_snapshots(&pool, 3).await;

    let first = TargetRepo::insert_pending_batch(&pool, campaign.id, &snapshots)
        .await
        .unwrap();
    assert_eq!(first, 3);

    let second = TargetRepo::insert_pending_batch(&pool, campaign.id, &snapshots)
        .await
        .unwrap();
    assert_eq!(second, 0, "duplicate inserts must be no-ops, not failures");

    assert_eq!(
        TargetRepo::count_for_campaign(&pool, campaign.id).await.unwrap(),
        3
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn re_resolution_adds_only_new_recipients(pool: PgPool) {
    let campaign = CampaignRepo::create(&pool, &new_campaign("text")).await.unwrap();
    let mut snapshots = seed_snapshots(&pool, 2).await;
    TargetRepo::insert_pending_batch(&pool, campaign.id, &snapshots)
        .await
        .unwrap();

    snapshots.extend(seed_snapshots(&pool, 1).await);
    let added = TargetRepo::insert_pending_batch(&pool, campaign.id, &snapshots)
        .await
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(
        TargetRepo::count_for_campaign(&pool, campaign.id).await.unwrap(),
        3
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn targets_snapshot_recipient_attributes(pool: PgPool) {
    let campaign = CampaignRepo::create(&pool, &new_campaign("text")).await.unwrap();
    let recipient = RecipientRepo::create(
        &pool,
        &CreateRecipient {
            language: "de".to_string(),
            formal_address: true,
            ..CreateRecipient::new("chat-de")
        },
    )
    .await
    .unwrap();

    let snapshot = RecipientSnapshot {
        id: recipient.id,
        address: recipient.address.clone(),
        language: recipient.language.clone(),
        formal_address: recipient.formal_address,
        timezone: recipient.timezone.clone(),
        active_hours_start: recipient.active_hours_start,
        active_hours_end: recipient.active_hours_end,
        notifications_enabled: recipient.notifications_enabled,
        onboarding_completed: recipient.onboarding_completed,
        last_active_at: recipient.last_active_at,
        is_blocked: recipient.is_blocked,
    };
    TargetRepo::insert_pending_batch(&pool, campaign.id, &[snapshot])
        .await
        .unwrap();

    let targets = TargetRepo::list_for_campaign(&pool, campaign.id).await.unwrap();
    assert_eq!(targets[0].language, "de");
    assert!(targets[0].formal_address);
    assert_eq!(targets[0].status_id, TargetStatus::Pending.id());
}

// ---------------------------------------------------------------------------
// The claim
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_moves_due_targets_into_sending(pool: PgPool) {
    let campaign = sending_campaign_with_due_targets(&pool, 3).await;

    let claimed = TargetRepo::claim_due(&pool, 10).await.unwrap();
    assert_eq!(claimed.len(), 3);
    for target in &claimed {
        assert_eq!(target.status_id, TargetStatus::Sending.id());
        assert_eq!(target.campaign_id, campaign.id);
    }

    // Everything due is already claimed; a second batch is empty.
    assert!(TargetRepo::claim_due(&pool, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_respects_the_batch_limit(pool: PgPool) {
    sending_campaign_with_due_targets(&pool, 5).await;

    let first = TargetRepo::claim_due(&pool, 2).await.unwrap();
    assert_eq!(first.len(), 2);
    let second = TargetRepo::claim_due(&pool, 10).await.unwrap();
    assert_eq!(second.len(), 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn future_targets_are_not_claimed(pool: PgPool) {
    let campaign = sending_campaign_with_due_targets(&pool, 1).await;
    // Push the planned instant back into the future.
    sqlx::query("UPDATE targets SET planned_send_at = NOW() + INTERVAL '1 hour' WHERE campaign_id = $1")
        .bind(campaign.id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(TargetRepo::claim_due(&pool, 10).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn targets_of_non_sending_campaigns_are_not_claimed(pool: PgPool) {
    let campaign = CampaignRepo::create(&pool, &new_campaign("text")).await.unwrap();
    let snapshots = seed_snapshots(&pool, 1).await;
    TargetRepo::insert_pending_batch(&pool, campaign.id, &snapshots)
        .await
        .unwrap();
    for target in TargetRepo::list_pending(&pool, campaign.id).await.unwrap() {
        TargetRepo::store_rendered(&pool, target.id, "text").await.unwrap();
        TargetRepo::set_planned(&pool, target.id, Utc::now() - Duration::minutes(5))
            .await
            .unwrap();
    }

    // Campaign still in draft: nothing is due.
    assert!(TargetRepo::claim_due(&pool, 10).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Terminal compare-and-set
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn sent_targets_are_never_re_attempted(pool: PgPool) {
    sending_campaign_with_due_targets(&pool, 1).await;
    let claimed = TargetRepo::claim_due(&pool, 1).await.unwrap();
    let target_id = claimed[0].id;

    assert!(TargetRepo::mark_sent(&pool, target_id).await.unwrap());
    // A second recording attempt loses the CAS.
    assert!(!TargetRepo::mark_sent(&pool, target_id).await.unwrap());
    // And the target can never be claimed again.
    assert!(TargetRepo::claim_due(&pool, 10).await.unwrap().is_empty());

    let target = TargetRepo::find_by_id(&pool, target_id).await.unwrap().unwrap();
    assert_eq!(target.status_id, TargetStatus::Sent.id());
    assert!(target.sent_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn terminal_targets_resist_every_other_transition(pool: PgPool) {
    sending_campaign_with_due_targets(&pool, 1).await;
    let claimed = TargetRepo::claim_due(&pool, 1).await.unwrap();
    let target_id = claimed[0].id;
    assert!(TargetRepo::mark_failed(&pool, target_id, "gateway rejected").await.unwrap());

    assert!(!TargetRepo::mark_sent(&pool, target_id).await.unwrap());
    assert!(!TargetRepo::mark_skipped(&pool, target_id, skip_reason::DEADLINE_EXCEEDED)
        .await
        .unwrap());
    assert!(!TargetRepo::store_rendered(&pool, target_id, "again").await.unwrap());

    let target = TargetRepo::find_by_id(&pool, target_id).await.unwrap().unwrap();
    assert_eq!(target.status_id, TargetStatus::Failed.id());
    assert_eq!(target.error.as_deref(), Some("gateway rejected"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn skip_remaining_leaves_terminal_targets_unchanged(pool: PgPool) {
    let campaign = sending_campaign_with_due_targets(&pool, 3).await;

    // Deliver one target, leave two open.
    let claimed = TargetRepo::claim_due(&pool, 1).await.unwrap();
    TargetRepo::mark_sent(&pool, claimed[0].id).await.unwrap();

    let skipped = TargetRepo::skip_remaining(&pool, campaign.id, skip_reason::CAMPAIGN_CANCELLED)
        .await
        .unwrap();
    assert_eq!(skipped, 2);

    let targets = TargetRepo::list_for_campaign(&pool, campaign.id).await.unwrap();
    let sent = targets
        .iter()
        .filter(|t| t.status_id == TargetStatus::Sent.id())
        .count();
    let skipped_rows = targets
        .iter()
        .filter(|t| t.status_id == TargetStatus::Skipped.id())
        .count();
    assert_eq!(sent, 1);
    assert_eq!(skipped_rows, 2);
}

// ---------------------------------------------------------------------------
// Deadline sweep and activity replan
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_skips_targets_past_not_after(pool: PgPool) {
    let campaign = sending_campaign_with_due_targets(&pool, 2).await;
    sqlx::query("UPDATE campaigns SET not_after = NOW() - INTERVAL '1 minute' WHERE id = $1")
        .bind(campaign.id)
        .execute(&pool)
        .await
        .unwrap();

    let skipped = TargetRepo::sweep_deadline_exceeded(&pool, 900.0).await.unwrap();
    assert_eq!(skipped, 2);

    for target in TargetRepo::list_for_campaign(&pool, campaign.id).await.unwrap() {
        assert_eq!(target.status_id, TargetStatus::Skipped.id());
        assert_eq!(
            target.skip_reason.as_deref(),
            Some(skip_reason::DEADLINE_EXCEEDED)
        );
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn sweep_ignores_campaigns_inside_their_window(pool: PgPool) {
    sending_campaign_with_due_targets(&pool, 1).await;
    // Window is 24h and scheduled_at is fresh: nothing to skip.
    assert_eq!(TargetRepo::sweep_deadline_exceeded(&pool, 900.0).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn activity_replan_pulls_future_targets_forward_once(pool: PgPool) {
    let campaign = sending_campaign_with_due_targets(&pool, 1).await;
    let target = &TargetRepo::list_for_campaign(&pool, campaign.id).await.unwrap()[0];
    let recipient_id = target.recipient_id;

    sqlx::query("UPDATE targets SET planned_send_at = NOW() + INTERVAL '6 hours' WHERE id = $1")
        .bind(target.id)
        .execute(&pool)
        .await
        .unwrap();

    let advanced = TargetRepo::replan_for_activity(&pool, recipient_id, 3).await.unwrap();
    assert_eq!(advanced, 1);

    let row = TargetRepo::find_by_id(&pool, target.id).await.unwrap().unwrap();
    assert!(row.planned_send_at.unwrap() <= Utc::now());
    assert_eq!(row.activity_send_count, 1);
    assert!(row.last_activity_triggered_at.is_some());

    // The planned instant is now in the past; a second trigger must not
    // touch the row again (it would never delay, and it is already due).
    let again = TargetRepo::replan_for_activity(&pool, recipient_id, 3).await.unwrap();
    assert_eq!(again, 0);
    let row = TargetRepo::find_by_id(&pool, target.id).await.unwrap().unwrap();
    assert_eq!(row.activity_send_count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn activity_replan_respects_the_send_cap(pool: PgPool) {
    let campaign = sending_campaign_with_due_targets(&pool, 1).await;
    let target = &TargetRepo::list_for_campaign(&pool, campaign.id).await.unwrap()[0];

    sqlx::query(
        "UPDATE targets SET planned_send_at = NOW() + INTERVAL '6 hours', \
         activity_send_count = 3 WHERE id = $1",
    )
    .bind(target.id)
    .execute(&pool)
    .await
    .unwrap();

    let advanced = TargetRepo::replan_for_activity(&pool, target.recipient_id, 3)
        .await
        .unwrap();
    assert_eq!(advanced, 0, "targets at the cap must not be advanced");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn status_counts_tally_per_status(pool: PgPool) {
    let campaign = sending_campaign_with_due_targets(&pool, 3).await;
    let claimed = TargetRepo::claim_due(&pool, 1).await.unwrap();
    TargetRepo::mark_sent(&pool, claimed[0].id).await.unwrap();

    let counts = TargetRepo::status_counts(&pool, campaign.id).await.unwrap();
    let get = |status: TargetStatus| {
        counts
            .iter()
            .find(|c| c.status_id == status.id())
            .map(|c| c.count)
            .unwrap_or(0)
    };
    assert_eq!(get(TargetStatus::Rendered), 2);
    assert_eq!(get(TargetStatus::Sent), 1);
    assert_eq!(TargetRepo::open_count(&pool, campaign.id).await.unwrap(), 2);
}
