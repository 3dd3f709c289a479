use crate::domain::product::{ProductObservation, ProductType};
use crate::error::{RowError, SourceError};
use crate::storage::columns::{self, LoadReport};
use sqlx::postgres::PgRow;

pub const HISTORY_COLUMNS: [&str; 8] = [
    "collected_at",
    "bank_name",
    "product_name",
    "term_months",
    "base_rate",
    "bonus_rate",
    "preferential_condition_text",
    "product_type",
];

/// Loads every collection run, oldest first.
pub async fn load_history(
    pool: &sqlx::PgPool,
    table: &str,
) -> Result<LoadReport<ProductObservation>, SourceError> {
    let table = columns::validate_table_name(table)?;
    let rows = sqlx::query(&format!("SELECT * FROM {table} ORDER BY collected_at ASC"))
        .persistent(false)
        .fetch_all(pool)
        .await?;

    columns::require_columns(table, &rows, &HISTORY_COLUMNS)?;

    let report = LoadReport::collect(table, rows.iter().map(observation_from_row));
    tracing::debug!(
        table,
        loaded = report.rows.len(),
        rejected = report.rejected.len(),
        "loaded rate history"
    );
    Ok(report)
}

fn observation_from_row(row: &PgRow) -> Result<ProductObservation, RowError> {
    let product_type: ProductType = columns::text(row, "product_type")?.parse()?;
    let observation = ProductObservation {
        bank_name: columns::text(row, "bank_name")?,
        product_name: columns::text(row, "product_name")?,
        product_code: None,
        product_type,
        term_months: columns::term_months(row, "term_months")?,
        base_rate: columns::decimal(row, "base_rate")?,
        bonus_rate: columns::decimal(row, "bonus_rate")?,
        max_limit: None,
        preferential_condition_text: columns::opt_text(row, "preferential_condition_text")?
            .unwrap_or_default(),
        join_channel: None,
        collected_at: columns::timestamp(row, "collected_at")?,
    };
    observation.validate()?;
    Ok(observation)
}
