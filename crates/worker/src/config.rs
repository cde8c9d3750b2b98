/// Worker configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Executor claim-loop polling interval in seconds (default: `1`).
    pub poll_interval_secs: u64,
    /// Targets claimed per tick (default: `16`).
    pub claim_batch: i64,
    /// Bound on concurrent in-flight sends (default: `4`).
    pub max_in_flight: usize,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default |
    /// |----------------------|---------|
    /// | `DATABASE_URL`       | —       |
    /// | `POLL_INTERVAL_SECS` | `1`     |
    /// | `CLAIM_BATCH`        | `16`    |
    /// | `MAX_IN_FLIGHT`      | `4`     |
    pub fn from_env() -> Self {
        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let poll_interval_secs: u64 = std::env::var("POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "1".into())
            .parse()
            .expect("POLL_INTERVAL_SECS must be a valid u64");

        let claim_batch: i64 = std::env::var("CLAIM_BATCH")
            .unwrap_or_else(|_| "16".into())
            .parse()
            .expect("CLAIM_BATCH must be a valid i64");

        let max_in_flight: usize = std::env::var("MAX_IN_FLIGHT")
            .unwrap_or_else(|_| "4".into())
            .parse()
            .expect("MAX_IN_FLIGHT must be a valid usize");

        Self {
            database_url,
            poll_interval_secs,
            claim_batch,
            max_in_flight,
        }
    }
}
