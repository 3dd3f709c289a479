use crate::analytics::filter::filter;
use crate::analytics::rank::rank;
use crate::domain::product::ProductObservation;
use crate::domain::view::ViewState;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const EASY_SPREAD_BELOW: Decimal = dec!(0.3);
const MODERATE_SPREAD_BELOW: Decimal = dec!(0.8);

/// Products with a maximum deposit below this (KRW) are treated as bait offers.
pub const BAIT_LIMIT_BELOW: Decimal = dec!(1000000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadLabel {
    /// Single-rate product.
    None,
    Easy,
    Moderate,
    Hard,
}

impl SpreadLabel {
    pub fn from_spread(spread: Decimal) -> Self {
        if spread.is_zero() {
            SpreadLabel::None
        } else if spread < EASY_SPREAD_BELOW {
            SpreadLabel::Easy
        } else if spread < MODERATE_SPREAD_BELOW {
            SpreadLabel::Moderate
        } else {
            SpreadLabel::Hard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitAssessment {
    Bait,
    Genuine,
}

impl LimitAssessment {
    pub fn from_limit(max_limit: Decimal) -> Self {
        if max_limit < BAIT_LIMIT_BELOW {
            LimitAssessment::Bait
        } else {
            LimitAssessment::Genuine
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub bank_name: String,
    pub product_name: String,
    pub product_code: Option<String>,
    pub is_reference: bool,
    pub base_rate: Decimal,
    pub bonus_rate: Decimal,
    pub bonus_spread: Decimal,
    pub spread_label: SpreadLabel,
    pub preferential_condition: Option<String>,
    pub join_channel: Option<String>,
    pub max_limit: Option<Decimal>,
    pub limit_assessment: Option<LimitAssessment>,
    /// Competitors only, and only when the reference bank has a product in the slice.
    pub gap_to_reference: Option<Decimal>,
}

/// Per-product insight cards for the selected slice and bank.
///
/// One card per (product code, bank); rows without a code fall back to the product name.
/// The reference bank's products come first, then everything else by bonus rate.
pub fn product_details(
    observations: &[ProductObservation],
    view: &ViewState,
    reference_bank: &str,
) -> Vec<ProductDetail> {
    let reference_best = rank(observations, view.product_type, view.term_months, reference_bank)
        .reference_best_bonus_rate;

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut details: Vec<ProductDetail> = filter(observations, &view.selection(observations))
        .into_iter()
        .filter(|o| {
            let code = o.product_code.as_ref().unwrap_or(&o.product_name);
            seen.insert((code.clone(), o.bank_name.clone()))
        })
        .map(|o| {
            let is_reference = o.bank_name == reference_bank;
            let bonus_spread = o.bonus_spread();
            ProductDetail {
                bank_name: o.bank_name.clone(),
                product_name: o.product_name.clone(),
                product_code: o.product_code.clone(),
                is_reference,
                base_rate: o.base_rate,
                bonus_rate: o.bonus_rate,
                bonus_spread,
                spread_label: SpreadLabel::from_spread(bonus_spread),
                preferential_condition: o.preferential_condition().map(str::to_string),
                join_channel: o.join_channel.clone().filter(|c| !c.trim().is_empty()),
                max_limit: o.max_limit,
                limit_assessment: o.max_limit.map(LimitAssessment::from_limit),
                gap_to_reference: if is_reference {
                    None
                } else {
                    reference_best.map(|r| o.bonus_rate - r)
                },
            }
        })
        .collect();

    details.sort_by(|a, b| {
        b.is_reference
            .cmp(&a.is_reference)
            .then_with(|| b.bonus_rate.cmp(&a.bonus_rate))
    });
    details
}
