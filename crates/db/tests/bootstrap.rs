use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify seed data.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    // Health check
    herald_db::health_check(&pool).await.unwrap();

    // Both lookup tables exist and carry seed data.
    for table in ["campaign_statuses", "target_statuses"] {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 6, "{table} should have six seed rows");
    }
}

/// Seed names must match the order the status enums depend on.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_status_seed_order(pool: PgPool) {
    let campaign: Vec<(i16, String)> =
        sqlx::query_as("SELECT id, name FROM campaign_statuses ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    let names: Vec<&str> = campaign.iter().map(|(_, n)| n.as_str()).collect();
    assert_eq!(
        names,
        ["draft", "preview", "scheduled", "sending", "done", "cancelled"]
    );

    let target: Vec<(i16, String)> =
        sqlx::query_as("SELECT id, name FROM target_statuses ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    let names: Vec<&str> = target.iter().map(|(_, n)| n.as_str()).collect();
    assert_eq!(
        names,
        ["pending", "rendered", "sending", "sent", "failed", "skipped"]
    );
}
