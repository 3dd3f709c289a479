use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::domain::product::ProductType;

/// Expected outcomes of slice-level queries. These are ordinary runtime states of the
/// dashboard (a bank without a product for some term, a term nobody offers), so callers
/// receive them as values rather than failures of the request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SliceError {
    #[error("no observations for {product_type} / {term_months} months")]
    EmptySlice {
        product_type: ProductType,
        term_months: i32,
    },

    #[error("reference bank {bank} has no observations for {product_type} / {term_months} months")]
    MissingReferenceBank {
        bank: String,
        product_type: ProductType,
        term_months: i32,
    },
}

/// Why a single upstream row was excluded from a load.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowError {
    #[error("bonus rate {bonus_rate} is below base rate {base_rate}")]
    BonusBelowBase {
        base_rate: Decimal,
        bonus_rate: Decimal,
    },

    #[error("unknown product type: {value}")]
    UnknownProductType { value: String },

    #[error("unsupported term: {term_months} months")]
    UnknownTerm { term_months: i32 },

    #[error("column {column} is null")]
    MissingValue { column: String },

    #[error("column {column} could not be decoded: {detail}")]
    Decode { column: String, detail: String },
}

/// Failures of the upstream data source. Any of these ends the current request.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream data source unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),

    #[error("table {table} is missing expected columns: {}", missing.join(", "))]
    SchemaMismatch { table: String, missing: Vec<String> },

    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),
}
