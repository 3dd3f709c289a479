use crate::analytics::rank::Ranking;
use crate::domain::comparison::ComparisonRow;
use crate::domain::product::ProductType;
use crate::error::SliceError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

// Tier thresholds, in percentage points / normalized difficulty.
const HIGH_RISK_MIN_GAP: Decimal = dec!(0.30);
const HIGH_RISK_MAX_DIFFICULTY: Decimal = dec!(0.20);
const WATCH_MIN_GAP: Decimal = dec!(0.15);

const EASY_MAX_DIFFICULTY: Decimal = dec!(0.10);
const MODERATE_MAX_DIFFICULTY: Decimal = dec!(0.30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    HighRisk,
    Watch,
    Monitor,
}

impl RiskTier {
    /// Higher is more threatening.
    pub fn severity(&self) -> u8 {
        match self {
            RiskTier::HighRisk => 2,
            RiskTier::Watch => 1,
            RiskTier::Monitor => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLabel {
    Easy,
    Moderate,
    Hard,
}

impl DifficultyLabel {
    pub fn from_score(difficulty_score: Decimal) -> Self {
        if difficulty_score <= EASY_MAX_DIFFICULTY {
            DifficultyLabel::Easy
        } else if difficulty_score <= MODERATE_MAX_DIFFICULTY {
            DifficultyLabel::Moderate
        } else {
            DifficultyLabel::Hard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskClassification {
    /// Competitor bonus rate minus the reference bank's best bonus rate. Negative means
    /// the reference bank is still ahead.
    pub rate_gap: Decimal,
    pub difficulty_score: Decimal,
    pub tier: RiskTier,
    pub difficulty_label: DifficultyLabel,
}

pub fn tier_for(rate_gap: Decimal, difficulty_score: Decimal) -> RiskTier {
    if rate_gap >= HIGH_RISK_MIN_GAP && difficulty_score <= HIGH_RISK_MAX_DIFFICULTY {
        RiskTier::HighRisk
    } else if rate_gap >= WATCH_MIN_GAP {
        RiskTier::Watch
    } else {
        RiskTier::Monitor
    }
}

pub fn classify_rates(
    bonus_rate: Decimal,
    difficulty_score: Decimal,
    reference_best_bonus_rate: Decimal,
) -> RiskClassification {
    let rate_gap = bonus_rate - reference_best_bonus_rate;
    RiskClassification {
        rate_gap,
        difficulty_score,
        tier: tier_for(rate_gap, difficulty_score),
        difficulty_label: DifficultyLabel::from_score(difficulty_score),
    }
}

pub fn classify(row: &ComparisonRow, reference_best_bonus_rate: Decimal) -> RiskClassification {
    classify_rates(row.bank_max_rate, row.difficulty, reference_best_bonus_rate)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub bank_name: String,
    pub bank_product_name: String,
    pub bank_base_rate: Decimal,
    pub bank_max_rate: Decimal,
    pub benefit_text: String,
    #[serde(flatten)]
    pub classification: RiskClassification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBoard {
    pub product_type: ProductType,
    pub term_months: i32,
    pub reference_best_bonus_rate: Option<Decimal>,
    pub items: Vec<RiskAssessment>,
}

/// Classifies every competitor row of the comparison join in `ranking`'s slice.
///
/// Gaps are measured against the reference bank's best bonus rate in the product
/// catalog, so any reference bank works, not only the one the join was built for. An
/// empty slice gives an empty board; a non-empty slice whose reference bank has no
/// product is `MissingReferenceBank`. Items are ordered by tier, then by rate gap
/// descending.
pub fn risk_board(rows: &[ComparisonRow], ranking: &Ranking) -> Result<RiskBoard, SliceError> {
    let (product_type, term_months) = (ranking.product_type, ranking.term_months);
    let reference_bank = ranking.reference_bank.as_str();
    let slice: Vec<&ComparisonRow> = rows
        .iter()
        .filter(|r| r.in_slice(product_type, term_months))
        .collect();

    if slice.is_empty() {
        return Ok(RiskBoard {
            product_type,
            term_months,
            reference_best_bonus_rate: None,
            items: Vec::new(),
        });
    }

    let reference_best = ranking
        .reference_best_bonus_rate
        .ok_or_else(|| SliceError::MissingReferenceBank {
            bank: reference_bank.to_string(),
            product_type,
            term_months,
        })?;

    let mut items: Vec<RiskAssessment> = slice
        .into_iter()
        .filter(|r| r.bank_name != reference_bank)
        .map(|r| RiskAssessment {
            bank_name: r.bank_name.clone(),
            bank_product_name: r.bank_product_name.clone(),
            bank_base_rate: r.bank_base_rate,
            bank_max_rate: r.bank_max_rate,
            benefit_text: r.benefit_text.clone(),
            classification: classify(r, reference_best),
        })
        .collect();

    items.sort_by(|a, b| {
        b.classification
            .tier
            .severity()
            .cmp(&a.classification.tier.severity())
            .then_with(|| b.classification.rate_gap.cmp(&a.classification.rate_gap))
    });

    Ok(RiskBoard {
        product_type,
        term_months,
        reference_best_bonus_rate: Some(reference_best),
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::rank::rank;
    use crate::domain::product::tests::obs;

    fn ranking_with(reference_bank: &str, reference_best: Option<Decimal>) -> Ranking {
        let products: Vec<_> = reference_best
            .map(|r| obs(reference_bank, ProductType::Deposit, 12, dec!(2.00), r))
            .into_iter()
            .collect();
        rank(&products, ProductType::Deposit, 12, reference_bank)
    }

    fn row(bank: &str, reference_max: Option<Decimal>, max: Decimal, difficulty: Decimal) -> ComparisonRow {
        ComparisonRow {
            product_type: ProductType::Deposit,
            reference_product_name: reference_max.map(|_| "WON플러스예금".to_string()),
            term_months: 12,
            bank_name: bank.to_string(),
            bank_product_name: format!("{bank} 예금"),
            reference_base_rate: reference_max,
            reference_max_rate: reference_max,
            bank_base_rate: dec!(2.00),
            bank_max_rate: max,
            rate_diff: reference_max.map(|r| max - r),
            difficulty,
            benefit_text: String::new(),
        }
    }

    #[test]
    fn tier_rule_examples() {
        assert_eq!(tier_for(dec!(0.35), dec!(0.15)), RiskTier::HighRisk);
        assert_eq!(tier_for(dec!(0.20), dec!(0.05)), RiskTier::Watch);
        assert_eq!(tier_for(dec!(0.05), dec!(0.05)), RiskTier::Monitor);
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        assert_eq!(tier_for(dec!(0.30), dec!(0.20)), RiskTier::HighRisk);
        assert_eq!(tier_for(dec!(0.30), dec!(0.21)), RiskTier::Watch);
        assert_eq!(tier_for(dec!(0.15), dec!(0.90)), RiskTier::Watch);
        assert_eq!(tier_for(dec!(0.149), dec!(0.00)), RiskTier::Monitor);
        assert_eq!(tier_for(dec!(-1.00), dec!(0.00)), RiskTier::Monitor);
    }

    #[test]
    fn raising_gap_never_lowers_tier() {
        let difficulties = [dec!(0.00), dec!(0.10), dec!(0.20), dec!(0.25), dec!(1.20)];
        for difficulty in difficulties {
            let mut previous = 0u8;
            for step in -20..=60 {
                let gap = Decimal::new(step, 2);
                let severity = tier_for(gap, difficulty).severity();
                assert!(severity >= previous, "gap {gap} difficulty {difficulty}");
                previous = severity;
            }
        }
    }

    #[test]
    fn difficulty_labels() {
        assert_eq!(DifficultyLabel::from_score(dec!(0.10)), DifficultyLabel::Easy);
        assert_eq!(DifficultyLabel::from_score(dec!(0.11)), DifficultyLabel::Moderate);
        assert_eq!(DifficultyLabel::from_score(dec!(0.30)), DifficultyLabel::Moderate);
        assert_eq!(DifficultyLabel::from_score(dec!(0.31)), DifficultyLabel::Hard);
    }

    #[test]
    fn negative_gap_is_kept() {
        let c = classify(&row("A", Some(dec!(3.50)), dec!(3.20), dec!(0.05)), dec!(3.50));
        assert_eq!(c.rate_gap, dec!(-0.30));
        assert_eq!(c.tier, RiskTier::Monitor);
    }

    #[test]
    fn board_orders_by_tier_then_gap() {
        let rows = vec![
            row("우리은행", Some(dec!(3.00)), dec!(3.00), dec!(0.00)),
            row("A", Some(dec!(3.00)), dec!(3.10), dec!(0.05)),
            row("B", Some(dec!(3.00)), dec!(3.40), dec!(0.50)),
            row("C", Some(dec!(3.00)), dec!(3.35), dec!(0.10)),
            row("D", Some(dec!(3.00)), dec!(3.20), dec!(0.05)),
        ];
        let board = risk_board(&rows, &ranking_with("우리은행", Some(dec!(3.00)))).unwrap();
        let banks: Vec<_> = board.items.iter().map(|i| i.bank_name.as_str()).collect();
        assert_eq!(banks, ["C", "B", "D", "A"]);
        assert_eq!(board.items[0].classification.tier, RiskTier::HighRisk);
        assert_eq!(board.items[1].classification.tier, RiskTier::Watch);
        assert_eq!(board.reference_best_bonus_rate, Some(dec!(3.00)));
    }

    #[test]
    fn board_without_reference_product_is_missing_reference() {
        let rows = vec![row("A", None, dec!(3.10), dec!(0.05))];
        assert!(matches!(
            risk_board(&rows, &ranking_with("우리은행", None)),
            Err(SliceError::MissingReferenceBank { .. })
        ));
    }

    #[test]
    fn empty_slice_gives_empty_board() {
        let rows = vec![row("A", Some(dec!(3.00)), dec!(3.10), dec!(0.05))];
        let savings = rank(&[], ProductType::Savings, 12, "우리은행");
        let board = risk_board(&rows, &savings).unwrap();
        assert!(board.items.is_empty());
        assert_eq!(board.reference_best_bonus_rate, None);
    }

    #[test]
    fn gaps_follow_a_non_default_reference_bank() {
        let rows = vec![
            row("부산은행", Some(dec!(3.00)), dec!(3.40), dec!(0.05)),
            row("A", Some(dec!(3.00)), dec!(3.10), dec!(0.05)),
        ];
        let board = risk_board(&rows, &ranking_with("부산은행", Some(dec!(3.40)))).unwrap();
        assert_eq!(board.reference_best_bonus_rate, Some(dec!(3.40)));
        assert_eq!(board.items.len(), 1);
        assert_eq!(board.items[0].bank_name, "A");
        assert_eq!(board.items[0].classification.rate_gap, dec!(-0.30));
        assert_eq!(board.items[0].classification.tier, RiskTier::Monitor);
    }
}
