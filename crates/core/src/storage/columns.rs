//! Name-based access to upstream result columns.
//!
//! Upstream tables are owned by the collection pipeline. Every load checks that the
//! columns we read are present by name, and decodes each cell leniently enough to
//! survive NUMERIC vs float vs text drift without misreading a value.

use crate::error::{RowError, SourceError};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Float rates are rounded to this many places before use, so that exact equality in
/// change detection only sees genuine repricing.
pub const FLOAT_RATE_SCALE: u32 = 4;

/// Only the first few rejected rows of a load are logged individually.
const MAX_LOGGED_REJECTS: usize = 10;

pub fn missing_columns(present: &[&str], expected: &[&str]) -> Vec<String> {
    expected
        .iter()
        .filter(|e| !present.iter().any(|p| p.eq_ignore_ascii_case(e)))
        .map(|e| e.to_string())
        .collect()
}

pub fn require_columns(table: &str, rows: &[PgRow], expected: &[&str]) -> Result<(), SourceError> {
    // An empty result has nothing to misread.
    let Some(first) = rows.first() else {
        return Ok(());
    };
    let present: Vec<&str> = first.columns().iter().map(|c| c.name()).collect();
    let missing = missing_columns(&present, expected);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SourceError::SchemaMismatch {
            table: table.to_string(),
            missing,
        })
    }
}

/// Table names come from configuration and end up inside SQL text, so only plain
/// (optionally schema-qualified) identifiers are accepted.
pub fn validate_table_name(name: &str) -> Result<&str, SourceError> {
    let valid_part = |p: &str| {
        !p.is_empty()
            && !p.starts_with(|c: char| c.is_ascii_digit())
            && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|&p| valid_part(p)) {
        Ok(name)
    } else {
        Err(SourceError::InvalidTableName(name.to_string()))
    }
}

pub fn normalize_float_rate(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(FLOAT_RATE_SCALE).normalize())
}

fn decode_error(column: &str, err: impl std::fmt::Display) -> RowError {
    RowError::Decode {
        column: column.to_string(),
        detail: err.to_string(),
    }
}

fn required<T>(column: &str, value: Option<T>) -> Result<T, RowError> {
    value.ok_or_else(|| RowError::MissingValue {
        column: column.to_string(),
    })
}

pub fn opt_text(row: &PgRow, column: &str) -> Result<Option<String>, RowError> {
    row.try_get::<Option<String>, _>(column)
        .map(|v| v.map(|s| s.trim().to_string()))
        .map_err(|e| decode_error(column, e))
}

pub fn text(row: &PgRow, column: &str) -> Result<String, RowError> {
    let value = opt_text(row, column)?.filter(|s| !s.is_empty());
    required(column, value)
}

/// Postgres storage class of a result cell, as far as rate decoding cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Numeric,
    Float8,
    Float4,
    Int8,
    Int4,
    Int2,
    /// Text or anything else; parsed from its string form.
    Other,
}

impl CellKind {
    fn from_type_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "NUMERIC" | "DECIMAL" => CellKind::Numeric,
            "FLOAT8" | "DOUBLE PRECISION" => CellKind::Float8,
            "FLOAT4" | "REAL" => CellKind::Float4,
            "INT8" | "BIGINT" => CellKind::Int8,
            "INT4" | "INT" | "INTEGER" => CellKind::Int4,
            "INT2" | "SMALLINT" => CellKind::Int2,
            _ => CellKind::Other,
        }
    }
}

fn cell_kind(row: &PgRow, column: &str) -> Result<CellKind, RowError> {
    let raw = row.try_get_raw(column).map_err(|e| decode_error(column, e))?;
    Ok(CellKind::from_type_name(raw.type_info().name()))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<Option<T>, RowError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get::<Option<T>, _>(column).map_err(|e| decode_error(column, e))
}

fn float_rate(column: &str, value: Option<f64>) -> Result<Option<Decimal>, RowError> {
    value
        .map(|f| normalize_float_rate(f).ok_or_else(|| decode_error(column, f)))
        .transpose()
}

pub fn opt_decimal(row: &PgRow, column: &str) -> Result<Option<Decimal>, RowError> {
    match cell_kind(row, column)? {
        CellKind::Numeric => get::<Decimal>(row, column),
        CellKind::Float8 => float_rate(column, get::<f64>(row, column)?),
        CellKind::Float4 => float_rate(column, get::<f32>(row, column)?.map(f64::from)),
        CellKind::Int8 => Ok(get::<i64>(row, column)?.map(Decimal::from)),
        CellKind::Int4 => Ok(get::<i32>(row, column)?.map(Decimal::from)),
        CellKind::Int2 => Ok(get::<i16>(row, column)?.map(Decimal::from)),
        CellKind::Other => match get::<String>(row, column)? {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => s
                .trim()
                .parse::<Decimal>()
                .map(Some)
                .map_err(|e| decode_error(column, e)),
            None => Ok(None),
        },
    }
}

pub fn decimal(row: &PgRow, column: &str) -> Result<Decimal, RowError> {
    required(column, opt_decimal(row, column)?)
}

/// Terms arrive as integers of any width, whole NUMERICs, or text such as `"12"` /
/// `"12개월"`.
pub fn term_months(row: &PgRow, column: &str) -> Result<i32, RowError> {
    match cell_kind(row, column)? {
        CellKind::Int4 => required(column, get::<i32>(row, column)?),
        CellKind::Int2 => required(column, get::<i16>(row, column)?).map(i32::from),
        CellKind::Int8 => required(column, get::<i64>(row, column)?)
            .and_then(|n| i32::try_from(n).map_err(|e| decode_error(column, e))),
        CellKind::Numeric => {
            let d = required(column, get::<Decimal>(row, column)?)?;
            whole_term(d).ok_or_else(|| decode_error(column, format!("not a term: {d}")))
        }
        CellKind::Float8 | CellKind::Float4 | CellKind::Other => {
            let s = text(row, column)?;
            parse_term(&s).ok_or_else(|| decode_error(column, format!("not a term: {s:?}")))
        }
    }
}

fn whole_term(d: Decimal) -> Option<i32> {
    if d.fract().is_zero() {
        d.to_i32()
    } else {
        None
    }
}

pub fn parse_term(s: &str) -> Option<i32> {
    s.trim().trim_end_matches("개월").trim().parse::<i32>().ok()
}

pub fn timestamp(row: &PgRow, column: &str) -> Result<DateTime<Utc>, RowError> {
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(column) {
        return required(column, v);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(column) {
        return required(column, v).map(|t| t.and_utc());
    }
    let s = text(row, column)?;
    parse_timestamp(&s).ok_or_else(|| decode_error(column, format!("not a timestamp: {s:?}")))
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|t| t.and_utc())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub index: usize,
    pub reason: RowError,
}

/// Outcome of decoding one upstream table. Bad rows are excluded and kept for reporting;
/// they never abort the load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport<T> {
    pub rows: Vec<T>,
    pub rejected: Vec<RejectedRow>,
}

impl<T> LoadReport<T> {
    pub fn collect(table: &str, results: impl IntoIterator<Item = Result<T, RowError>>) -> Self {
        let mut rows = Vec::new();
        let mut rejected = Vec::new();
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    if rejected.len() < MAX_LOGGED_REJECTS {
                        tracing::warn!(table, index, error = %reason, "rejected upstream row");
                    }
                    rejected.push(RejectedRow { index, reason });
                }
            }
        }
        if !rejected.is_empty() {
            tracing::warn!(
                table,
                loaded = rows.len(),
                rejected = rejected.len(),
                "upstream load finished with rejected rows"
            );
        }
        Self { rows, rejected }
    }
}
