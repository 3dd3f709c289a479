use crate::domain::product::{is_known_term, ProductType};
use crate::error::RowError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of the upstream comparison join: a competitor product next to the reference
/// bank's product for the same type and term. The `reference_*` fields are the
/// `woori_*` columns of the source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub product_type: ProductType,
    pub reference_product_name: Option<String>,
    pub term_months: i32,
    pub bank_name: String,
    pub bank_product_name: String,
    pub reference_base_rate: Option<Decimal>,
    pub reference_max_rate: Option<Decimal>,
    pub bank_base_rate: Decimal,
    pub bank_max_rate: Decimal,
    pub rate_diff: Option<Decimal>,
    /// Pre-normalized by upstream; lower means the bonus rate is easier to reach.
    pub difficulty: Decimal,
    pub benefit_text: String,
}

impl ComparisonRow {
    pub fn validate(&self) -> Result<(), RowError> {
        if !is_known_term(self.term_months) {
            return Err(RowError::UnknownTerm {
                term_months: self.term_months,
            });
        }
        if self.bank_max_rate < self.bank_base_rate {
            return Err(RowError::BonusBelowBase {
                base_rate: self.bank_base_rate,
                bonus_rate: self.bank_max_rate,
            });
        }
        Ok(())
    }

    pub fn in_slice(&self, product_type: ProductType, term_months: i32) -> bool {
        self.product_type == product_type && self.term_months == term_months
    }
}
