use crate::domain::product::{ProductObservation, ProductType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of weekly changes shown while the change list is collapsed.
pub const COLLAPSED_CHANGE_COUNT: usize = 4;

/// Everything the dashboard user has currently selected. Passed explicitly into every
/// view computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub product_type: ProductType,
    pub term_months: i32,
    /// `None` means all banks.
    #[serde(default)]
    pub bank: Option<String>,
    #[serde(default)]
    pub show_all_changes: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            product_type: ProductType::Deposit,
            term_months: 12,
            bank: None,
            show_all_changes: false,
        }
    }
}

impl ViewState {
    pub fn changes_limit(&self) -> Option<usize> {
        if self.show_all_changes {
            None
        } else {
            Some(COLLAPSED_CHANGE_COUNT)
        }
    }

    /// The filter selection equivalent to this view over `observations`.
    pub fn selection(&self, observations: &[ProductObservation]) -> Selection {
        let banks = match &self.bank {
            Some(bank) => BTreeSet::from([bank.clone()]),
            None => observations.iter().map(|o| o.bank_name.clone()).collect(),
        };
        Selection {
            product_types: BTreeSet::from([self.product_type]),
            terms: BTreeSet::from([self.term_months]),
            banks,
        }
    }
}

/// Filter selection sets. An empty set selects nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub product_types: BTreeSet<ProductType>,
    pub terms: BTreeSet<i32>,
    pub banks: BTreeSet<String>,
}

impl Selection {
    /// Selects every type, term and bank present in `observations`.
    pub fn everything(observations: &[ProductObservation]) -> Self {
        Self {
            product_types: observations.iter().map(|o| o.product_type).collect(),
            terms: observations.iter().map(|o| o.term_months).collect(),
            banks: observations.iter().map(|o| o.bank_name.clone()).collect(),
        }
    }

    pub fn contains(&self, o: &ProductObservation) -> bool {
        self.product_types.contains(&o.product_type)
            && self.terms.contains(&o.term_months)
            && self.banks.contains(&o.bank_name)
    }
}
