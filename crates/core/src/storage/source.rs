use crate::config::Settings;
use crate::domain::dataset::{RateDataset, RejectCounts};
use crate::error::SourceError;
use crate::storage::{columns, comparison, history, products};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The upstream store the dashboard reads from. Implementations return one consistent
/// snapshot of all tables, or fail the whole load.
#[async_trait::async_trait]
pub trait RateSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn load(&self) -> Result<RateDataset, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    pub products: String,
    pub comparison: String,
    pub history: String,
}

impl TableNames {
    pub fn from_settings(settings: &Settings) -> Result<Self, SourceError> {
        Ok(Self {
            products: columns::validate_table_name(&settings.products_table)?.to_string(),
            comparison: columns::validate_table_name(&settings.comparison_table)?.to_string(),
            history: columns::validate_table_name(&settings.history_table)?.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PgRateSource {
    pool: sqlx::PgPool,
    tables: TableNames,
}

impl PgRateSource {
    pub fn new(pool: sqlx::PgPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }
}

#[async_trait::async_trait]
impl RateSource for PgRateSource {
    fn source_name(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self) -> Result<RateDataset, SourceError> {
        let t0 = Instant::now();
        let products = products::load_products(&self.pool, &self.tables.products).await?;
        let comparison = comparison::load_comparison(&self.pool, &self.tables.comparison).await?;
        let history = history::load_history(&self.pool, &self.tables.history).await?;

        let dataset = RateDataset {
            rejected: RejectCounts {
                products: products.rejected.len(),
                comparison: comparison.rejected.len(),
                history: history.rejected.len(),
            },
            products: products.rows,
            comparison: comparison.rows,
            history: history.rows,
            loaded_at: Utc::now(),
        };

        tracing::info!(
            products = dataset.products.len(),
            comparison = dataset.comparison.len(),
            history = dataset.history.len(),
            rejected = dataset.rejected.total(),
            elapsed_ms = t0.elapsed().as_millis(),
            "rate dataset loaded"
        );
        Ok(dataset)
    }
}

#[derive(Debug, Clone)]
struct CachedDataset {
    dataset: Arc<RateDataset>,
    fetched_at: Instant,
}

/// Keeps the last successful load for `ttl`. A failed load is never cached and never
/// falls back to a stale snapshot.
pub struct CachedRateSource<S> {
    inner: S,
    ttl: Duration,
    slot: tokio::sync::Mutex<Option<CachedDataset>>,
}

impl<S: RateSource> CachedRateSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            slot: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn dataset(&self) -> Result<Arc<RateDataset>, SourceError> {
        let mut guard = self.slot.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.dataset));
            }
        }

        let dataset = Arc::new(self.inner.load().await?);
        *guard = Some(CachedDataset {
            dataset: Arc::clone(&dataset),
            fetched_at: Instant::now(),
        });
        Ok(dataset)
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
        tracing::info!(source = self.inner.source_name(), "rate dataset cache cleared");
    }
}
