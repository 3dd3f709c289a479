use crate::domain::product::{ProductObservation, ProductType};
use crate::error::{RowError, SourceError};
use crate::storage::columns::{self, LoadReport};
use sqlx::postgres::PgRow;

pub const PRODUCT_COLUMNS: [&str; 11] = [
    "bank_name",
    "product_name",
    "product_code",
    "product_type",
    "term_months",
    "base_rate",
    "bonus_rate",
    "max_limit",
    "preferential_condition",
    "join_channel",
    "collected_at",
];

pub async fn load_products(
    pool: &sqlx::PgPool,
    table: &str,
) -> Result<LoadReport<ProductObservation>, SourceError> {
    let table = columns::validate_table_name(table)?;
    let rows = sqlx::query(&format!("SELECT * FROM {table}"))
        .persistent(false)
        .fetch_all(pool)
        .await?;

    columns::require_columns(table, &rows, &PRODUCT_COLUMNS)?;

    let report = LoadReport::collect(table, rows.iter().map(product_from_row));
    tracing::debug!(
        table,
        loaded = report.rows.len(),
        rejected = report.rejected.len(),
        "loaded product catalog"
    );
    Ok(report)
}

fn product_from_row(row: &PgRow) -> Result<ProductObservation, RowError> {
    let product_type: ProductType = columns::text(row, "product_type")?.parse()?;
    let observation = ProductObservation {
        bank_name: columns::text(row, "bank_name")?,
        product_name: columns::text(row, "product_name")?,
        product_code: columns::opt_text(row, "product_code")?.filter(|s| !s.is_empty()),
        product_type,
        term_months: columns::term_months(row, "term_months")?,
        base_rate: columns::decimal(row, "base_rate")?,
        bonus_rate: columns::decimal(row, "bonus_rate")?,
        max_limit: columns::opt_decimal(row, "max_limit")?,
        preferential_condition_text: columns::opt_text(row, "preferential_condition")?
            .unwrap_or_default(),
        join_channel: columns::opt_text(row, "join_channel")?.filter(|s| !s.is_empty()),
        collected_at: columns::timestamp(row, "collected_at")?,
    };
    observation.validate()?;
    Ok(observation)
}
