pub mod columns;
pub mod comparison;
pub mod history;
pub mod products;
pub mod source;

pub use source::{CachedRateSource, PgRateSource, RateSource, TableNames};

use anyhow::Context;

pub async fn connect(database_url: &str) -> anyhow::Result<sqlx::PgPool> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("connect DATABASE_URL failed")
}
