pub mod analytics;
pub mod domain;
pub mod error;
pub mod storage;
pub mod time;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    pub const DEFAULT_REFERENCE_BANK: &str = "우리은행";
    const DEFAULT_CACHE_TTL_SECS: u64 = 60;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub reference_bank: String,
        pub products_table: String,
        pub comparison_table: String,
        pub history_table: String,
        pub cache_ttl: Duration,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let cache_ttl_secs = match std::env::var("RATE_CACHE_TTL_SECS") {
                Ok(s) => s
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("RATE_CACHE_TTL_SECS must be an integer (got {s})"))?,
                Err(_) => DEFAULT_CACHE_TTL_SECS,
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                reference_bank: non_empty_var("REFERENCE_BANK")
                    .unwrap_or_else(|| DEFAULT_REFERENCE_BANK.to_string()),
                products_table: non_empty_var("PRODUCTS_TABLE")
                    .unwrap_or_else(|| "rate_products".to_string()),
                comparison_table: non_empty_var("COMPARISON_TABLE")
                    .unwrap_or_else(|| "rate_comparison".to_string()),
                history_table: non_empty_var("HISTORY_TABLE")
                    .unwrap_or_else(|| "rate_history".to_string()),
                cache_ttl: Duration::from_secs(cache_ttl_secs),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}
