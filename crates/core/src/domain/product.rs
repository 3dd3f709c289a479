use crate::error::RowError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Savings terms published by the FSS product API.
pub const KNOWN_TERMS_MONTHS: [i32; 6] = [1, 3, 6, 12, 24, 36];

/// Condition texts upstream uses to mean "no preferential condition".
const NO_CONDITION_MARKERS: [&str; 4] = ["해당사항 없음", "없음", "none", "-"];

pub fn is_known_term(term_months: i32) -> bool {
    KNOWN_TERMS_MONTHS.contains(&term_months)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    /// 정기예금
    Deposit,
    /// 적금
    Savings,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Deposit => "deposit",
            ProductType::Savings => "savings",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = RowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" | "예금" | "정기예금" => Ok(ProductType::Deposit),
            "savings" | "saving" | "적금" => Ok(ProductType::Savings),
            _ => Err(RowError::UnknownProductType {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductObservation {
    pub bank_name: String,
    pub product_name: String,
    pub product_code: Option<String>,
    pub product_type: ProductType,
    pub term_months: i32,
    pub base_rate: Decimal,
    pub bonus_rate: Decimal,
    pub max_limit: Option<Decimal>,
    pub preferential_condition_text: String,
    pub join_channel: Option<String>,
    pub collected_at: DateTime<Utc>,
}

impl ProductObservation {
    pub fn validate(&self) -> Result<(), RowError> {
        if !is_known_term(self.term_months) {
            return Err(RowError::UnknownTerm {
                term_months: self.term_months,
            });
        }
        if self.bonus_rate < self.base_rate {
            return Err(RowError::BonusBelowBase {
                base_rate: self.base_rate,
                bonus_rate: self.bonus_rate,
            });
        }
        Ok(())
    }

    pub fn in_slice(&self, product_type: ProductType, term_months: i32) -> bool {
        self.product_type == product_type && self.term_months == term_months
    }

    /// Bonus rate minus base rate: what a customer gains by meeting every condition.
    pub fn bonus_spread(&self) -> Decimal {
        self.bonus_rate - self.base_rate
    }

    /// The preferential condition text, or `None` when upstream marks it as absent.
    pub fn preferential_condition(&self) -> Option<&str> {
        let text = self.preferential_condition_text.trim();
        if text.is_empty()
            || NO_CONDITION_MARKERS
                .iter()
                .any(|m| text.eq_ignore_ascii_case(m))
        {
            return None;
        }
        Some(text)
    }
}
