use crate::domain::product::{ProductObservation, ProductType};
use crate::error::SliceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankRankEntry {
    pub bank_name: String,
    pub best_base_rate: Decimal,
    pub best_bonus_rate: Decimal,
    pub representative_product_name: String,
    pub rank: u32,
    /// Positive when this bank beats the reference. `None` when the reference bank has
    /// nothing in the slice.
    pub gap_to_reference: Option<Decimal>,
    /// Always zero or negative.
    pub gap_to_leader: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub product_type: ProductType,
    pub term_months: i32,
    pub reference_bank: String,
    pub reference_best_bonus_rate: Option<Decimal>,
    pub entries: Vec<BankRankEntry>,
}

impl Ranking {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn leader(&self) -> Option<&BankRankEntry> {
        self.entries.first()
    }

    pub fn entry(&self, bank_name: &str) -> Option<&BankRankEntry> {
        self.entries.iter().find(|e| e.bank_name == bank_name)
    }

    pub fn rank_of(&self, bank_name: &str) -> Option<u32> {
        self.entry(bank_name).map(|e| e.rank)
    }

    pub fn reference(&self) -> Result<&BankRankEntry, SliceError> {
        if self.entries.is_empty() {
            return Err(SliceError::EmptySlice {
                product_type: self.product_type,
                term_months: self.term_months,
            });
        }
        self.entry(&self.reference_bank)
            .ok_or_else(|| SliceError::MissingReferenceBank {
                bank: self.reference_bank.clone(),
                product_type: self.product_type,
                term_months: self.term_months,
            })
    }

    /// Increase the reference bank needs to reach rank 1; zero when it already leads.
    pub fn reference_gap_to_top(&self) -> Result<Decimal, SliceError> {
        let reference = self.reference()?;
        let top = self.leader().map_or(reference.best_bonus_rate, |e| e.best_bonus_rate);
        Ok(top - reference.best_bonus_rate)
    }
}

struct BankGroup<'a> {
    bank_name: &'a str,
    best_base_rate: Decimal,
    best_bonus_rate: Decimal,
    representative_product_name: &'a str,
}

/// Ranks every bank in one (product type, term) slice by its best bonus rate.
///
/// Base and bonus maxima are taken independently, so `best_base_rate` may come from a
/// different product than the representative one. Equal bonus rates keep the order in
/// which the banks first appear in `observations` and still get distinct ranks.
pub fn rank(
    observations: &[ProductObservation],
    product_type: ProductType,
    term_months: i32,
    reference_bank: &str,
) -> Ranking {
    let mut groups: Vec<BankGroup<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for o in observations.iter().filter(|o| o.in_slice(product_type, term_months)) {
        match index.get(o.bank_name.as_str()) {
            Some(&i) => {
                let g = &mut groups[i];
                if o.bonus_rate > g.best_bonus_rate {
                    g.best_bonus_rate = o.bonus_rate;
                    g.representative_product_name = o.product_name.as_str();
                }
                g.best_base_rate = g.best_base_rate.max(o.base_rate);
            }
            None => {
                index.insert(o.bank_name.as_str(), groups.len());
                groups.push(BankGroup {
                    bank_name: o.bank_name.as_str(),
                    best_base_rate: o.base_rate,
                    best_bonus_rate: o.bonus_rate,
                    representative_product_name: o.product_name.as_str(),
                });
            }
        }
    }

    // Stable: ties stay in first-seen order.
    groups.sort_by(|a, b| b.best_bonus_rate.cmp(&a.best_bonus_rate));

    let reference_best_bonus_rate = groups
        .iter()
        .find(|g| g.bank_name == reference_bank)
        .map(|g| g.best_bonus_rate);
    let leader_rate = groups.first().map(|g| g.best_bonus_rate);

    let entries = groups
        .iter()
        .enumerate()
        .map(|(i, g)| BankRankEntry {
            bank_name: g.bank_name.to_string(),
            best_base_rate: g.best_base_rate,
            best_bonus_rate: g.best_bonus_rate,
            representative_product_name: g.representative_product_name.to_string(),
            rank: (i + 1) as u32,
            gap_to_reference: reference_best_bonus_rate.map(|r| g.best_bonus_rate - r),
            gap_to_leader: leader_rate.map_or(Decimal::ZERO, |top| g.best_bonus_rate - top),
        })
        .collect();

    Ranking {
        product_type,
        term_months,
        reference_bank: reference_bank.to_string(),
        reference_best_bonus_rate,
        entries,
    }
}
