use crate::domain::comparison::ComparisonRow;
use crate::domain::product::ProductType;
use crate::error::{RowError, SourceError};
use crate::storage::columns::{self, LoadReport};
use sqlx::postgres::PgRow;

/// Columns of the competitor comparison join. The `woori_*` columns carry the reference
/// bank's side of each pair.
pub const COMPARISON_COLUMNS: [&str; 12] = [
    "product_type",
    "woori_product_name",
    "term_months",
    "bank_name",
    "bank_product_name",
    "woori_base_rate",
    "woori_max_rate",
    "bank_base_rate",
    "bank_max_rate",
    "rate_diff",
    "difficulty",
    "benefit_text",
];

pub async fn load_comparison(
    pool: &sqlx::PgPool,
    table: &str,
) -> Result<LoadReport<ComparisonRow>, SourceError> {
    let table = columns::validate_table_name(table)?;
    let rows = sqlx::query(&format!("SELECT * FROM {table}"))
        .persistent(false)
        .fetch_all(pool)
        .await?;

    columns::require_columns(table, &rows, &COMPARISON_COLUMNS)?;

    let report = LoadReport::collect(table, rows.iter().map(comparison_from_row));
    tracing::debug!(
        table,
        loaded = report.rows.len(),
        rejected = report.rejected.len(),
        "loaded comparison join"
    );
    Ok(report)
}

fn comparison_from_row(row: &PgRow) -> Result<ComparisonRow, RowError> {
    let product_type: ProductType = columns::text(row, "product_type")?.parse()?;
    let comparison = ComparisonRow {
        product_type,
        reference_product_name: columns::opt_text(row, "woori_product_name")?
            .filter(|s| !s.is_empty()),
        term_months: columns::term_months(row, "term_months")?,
        bank_name: columns::text(row, "bank_name")?,
        bank_product_name: columns::text(row, "bank_product_name")?,
        reference_base_rate: columns::opt_decimal(row, "woori_base_rate")?,
        reference_max_rate: columns::opt_decimal(row, "woori_max_rate")?,
        bank_base_rate: columns::decimal(row, "bank_base_rate")?,
        bank_max_rate: columns::decimal(row, "bank_max_rate")?,
        rate_diff: columns::opt_decimal(row, "rate_diff")?,
        difficulty: columns::decimal(row, "difficulty")?,
        benefit_text: columns::opt_text(row, "benefit_text")?.unwrap_or_default(),
    };
    comparison.validate()?;
    Ok(comparison)
}
