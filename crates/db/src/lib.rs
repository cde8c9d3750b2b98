//! PostgreSQL persistence for the Herald broadcast engine.
//!
//! Models are plain `FromRow` structs; repositories are zero-sized structs
//! whose async methods take `&PgPool` as the first argument. All status
//! transitions are guarded in SQL so concurrent workers cannot race a row
//! into an invalid state.

pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;

/// Shared connection pool type.
pub type DbPool = sqlx::PgPool;

/// Default maximum connections for the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connect to the database with the default pool sizing.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect(database_url)
        .await?;
    tracing::info!(max_connections = DEFAULT_MAX_CONNECTIONS, "Database pool connected");
    Ok(pool)
}

/// Cheap liveness probe used by the worker on startup.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
