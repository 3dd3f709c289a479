use crate::domain::product::{ProductObservation, ProductType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceStats {
    pub product_type: ProductType,
    pub term_months: i32,
    pub product_count: usize,
    pub bank_count: usize,
    pub mean_bonus_rate: Option<Decimal>,
    pub max_bonus_rate: Option<Decimal>,
    pub mean_base_rate: Option<Decimal>,
}

pub fn slice_stats(
    observations: &[ProductObservation],
    product_type: ProductType,
    term_months: i32,
) -> SliceStats {
    let rows: Vec<&ProductObservation> = observations
        .iter()
        .filter(|o| o.in_slice(product_type, term_months))
        .collect();
    let banks: BTreeSet<&str> = rows.iter().map(|o| o.bank_name.as_str()).collect();

    SliceStats {
        product_type,
        term_months,
        product_count: rows.len(),
        bank_count: banks.len(),
        mean_bonus_rate: mean(rows.iter().map(|o| o.bonus_rate)),
        max_bonus_rate: rows.iter().map(|o| o.bonus_rate).max(),
        mean_base_rate: mean(rows.iter().map(|o| o.base_rate)),
    }
}

fn mean(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let (sum, n) = values.fold((Decimal::ZERO, 0u32), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return None;
    }
    Some(sum / Decimal::from(n))
}
