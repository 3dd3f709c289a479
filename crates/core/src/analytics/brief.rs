use crate::analytics::changes::{detect_changes, group_series, ChangeDirection};
use crate::analytics::rank::{rank, Ranking};
use crate::analytics::stats::{slice_stats, SliceStats};
use crate::domain::dataset::RateDataset;
use crate::domain::product::{ProductObservation, ProductType};
use crate::domain::view::ViewState;
use crate::time::kst;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub top_rate: Option<Decimal>,
    pub top_bank: Option<String>,
    pub reference_best_rate: Option<Decimal>,
    pub reference_rank: Option<u32>,
    pub ranked_banks: usize,
    /// Increase the reference bank needs to reach rank 1.
    pub gap_to_top: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatAlert {
    pub rival_count: usize,
    pub top_bank: String,
    pub top_product: String,
    pub top_rate: Decimal,
    pub margin: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermRank {
    pub term_months: i32,
    pub reference_rank: Option<u32>,
    pub bank_count: usize,
    pub selected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeeklyChangeKind {
    Launched,
    Raised,
    Lowered,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyChange {
    pub bank_name: String,
    pub product_name: String,
    pub product_type: ProductType,
    pub term_months: i32,
    pub kind: WeeklyChangeKind,
    pub previous_bonus_rate: Option<Decimal>,
    pub bonus_rate: Decimal,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDigest {
    pub window_start: DateTime<Utc>,
    pub total: usize,
    pub launched: usize,
    pub raised: usize,
    pub lowered: usize,
    pub mixed: usize,
    pub items: Vec<WeeklyChange>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBrief {
    pub generated_at: DateTime<Utc>,
    pub kst_date: NaiveDate,
    pub product_type: ProductType,
    pub term_months: i32,
    pub reference_bank: String,
    pub headline: Headline,
    pub threat: Option<ThreatAlert>,
    pub adjacent_ranks: Vec<TermRank>,
    pub stats: SliceStats,
    pub changes: ChangeDigest,
    pub rejected_rows: usize,
}

pub fn headline(ranking: &Ranking) -> Headline {
    let leader = ranking.leader();
    let reference = ranking.reference().ok();
    Headline {
        top_rate: leader.map(|e| e.best_bonus_rate),
        top_bank: leader.map(|e| e.bank_name.clone()),
        reference_best_rate: reference.map(|e| e.best_bonus_rate),
        reference_rank: reference.map(|e| e.rank),
        ranked_banks: ranking.len(),
        gap_to_top: ranking.reference_gap_to_top().ok(),
    }
}

/// Competitor products in the ranked slice that pay more than the reference bank's best.
/// `None` when nobody beats the reference, or when the reference has nothing to compare.
pub fn threat_alert(observations: &[ProductObservation], ranking: &Ranking) -> Option<ThreatAlert> {
    let reference_best = ranking.reference_best_bonus_rate?;
    let mut rivals: Vec<&ProductObservation> = observations
        .iter()
        .filter(|o| o.in_slice(ranking.product_type, ranking.term_months))
        .filter(|o| o.bank_name != ranking.reference_bank && o.bonus_rate > reference_best)
        .collect();
    rivals.sort_by(|a, b| b.bonus_rate.cmp(&a.bonus_rate));

    let top = rivals.first()?;
    Some(ThreatAlert {
        rival_count: rivals.len(),
        top_bank: top.bank_name.clone(),
        top_product: top.product_name.clone(),
        top_rate: top.bonus_rate,
        margin: top.bonus_rate - reference_best,
    })
}

/// Reference bank rank for the selected term and its immediate neighbours among the terms
/// offered for `product_type`. An unknown selected term anchors on the shortest term.
pub fn adjacent_term_ranks(
    observations: &[ProductObservation],
    product_type: ProductType,
    term_months: i32,
    reference_bank: &str,
) -> Vec<TermRank> {
    let terms: Vec<i32> = observations
        .iter()
        .filter(|o| o.product_type == product_type)
        .map(|o| o.term_months)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let idx = terms.iter().position(|&t| t == term_months).unwrap_or(0);
    let lo = idx.saturating_sub(1);
    let hi = (idx + 2).min(terms.len());

    terms[lo..hi]
        .iter()
        .map(|&t| {
            let ranking = rank(observations, product_type, t, reference_bank);
            TermRank {
                term_months: t,
                reference_rank: ranking.rank_of(reference_bank),
                bank_count: ranking.len(),
                selected: t == term_months,
            }
        })
        .collect()
}

/// Rate changes and new listings observed at or after `window_start`, newest first.
///
/// A product counts as launched when its first observation falls inside the window,
/// provided the history reaches back before the window at all. Otherwise every product
/// of a freshly started collection would look new.
pub fn weekly_digest(
    history: &[ProductObservation],
    window_start: DateTime<Utc>,
    limit: Option<usize>,
) -> ChangeDigest {
    let history_predates_window = history.iter().any(|o| o.collected_at < window_start);
    let mut items: Vec<WeeklyChange> = Vec::new();

    for (key, series) in group_series(history) {
        let Some(first) = series.first() else {
            continue;
        };
        let change = |kind, previous_bonus_rate, bonus_rate, observed_at| WeeklyChange {
            bank_name: key.bank_name.clone(),
            product_name: key.product_name.clone(),
            product_type: key.product_type,
            term_months: key.term_months,
            kind,
            previous_bonus_rate,
            bonus_rate,
            observed_at,
        };

        if history_predates_window && first.collected_at >= window_start {
            items.push(change(
                WeeklyChangeKind::Launched,
                None,
                first.bonus_rate,
                first.collected_at,
            ));
        }

        for event in detect_changes(&series)
            .into_iter()
            .filter(|e| e.observed_at >= window_start)
        {
            let kind = match event.direction {
                ChangeDirection::Raised => WeeklyChangeKind::Raised,
                ChangeDirection::Lowered => WeeklyChangeKind::Lowered,
                ChangeDirection::Mixed => WeeklyChangeKind::Mixed,
            };
            items.push(change(
                kind,
                Some(event.previous_bonus_rate),
                event.bonus_rate,
                event.observed_at,
            ));
        }
    }

    items.sort_by(|a, b| b.observed_at.cmp(&a.observed_at));

    let count = |kind: WeeklyChangeKind| items.iter().filter(|c| c.kind == kind).count();
    let launched = count(WeeklyChangeKind::Launched);
    let raised = count(WeeklyChangeKind::Raised);
    let lowered = count(WeeklyChangeKind::Lowered);
    let mixed = count(WeeklyChangeKind::Mixed);
    let total = items.len();

    let truncated = limit.is_some_and(|n| total > n);
    if let Some(n) = limit {
        items.truncate(n);
    }

    ChangeDigest {
        window_start,
        total,
        launched,
        raised,
        lowered,
        mixed,
        items,
        truncated,
    }
}

pub fn build_brief(
    dataset: &RateDataset,
    view: &ViewState,
    reference_bank: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<DailyBrief> {
    let ranking = rank(&dataset.products, view.product_type, view.term_months, reference_bank);
    let window_start = kst::week_start(now)?;

    let brief = DailyBrief {
        generated_at: now,
        kst_date: kst::kst_date(now)?,
        product_type: view.product_type,
        term_months: view.term_months,
        reference_bank: reference_bank.to_string(),
        headline: headline(&ranking),
        threat: threat_alert(&dataset.products, &ranking),
        adjacent_ranks: adjacent_term_ranks(
            &dataset.products,
            view.product_type,
            view.term_months,
            reference_bank,
        ),
        stats: slice_stats(&dataset.products, view.product_type, view.term_months),
        changes: weekly_digest(&dataset.history, window_start, view.changes_limit()),
        rejected_rows: dataset.rejected.total(),
    };

    tracing::debug!(
        product_type = %view.product_type,
        term_months = view.term_months,
        ranked_banks = brief.headline.ranked_banks,
        reference_rank = ?brief.headline.reference_rank,
        changes = brief.changes.total,
        "daily brief built"
    );

    Ok(brief)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dataset::RejectCounts;
    use crate::domain::product::tests::obs;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    const WOORI: &str = "우리은행";

    fn catalog() -> Vec<ProductObservation> {
        vec![
            obs(WOORI, ProductType::Deposit, 12, dec!(2.80), dec!(3.00)),
            obs("SC제일은행", ProductType::Deposit, 12, dec!(2.90), dec!(3.25)),
            obs("아이엠뱅크", ProductType::Deposit, 12, dec!(2.50), dec!(3.10)),
            obs("부산은행", ProductType::Deposit, 12, dec!(2.50), dec!(2.70)),
            obs(WOORI, ProductType::Deposit, 6, dec!(2.60), dec!(2.90)),
            obs("부산은행", ProductType::Deposit, 6, dec!(2.50), dec!(2.70)),
            obs("부산은행", ProductType::Deposit, 24, dec!(2.50), dec!(2.70)),
            obs("부산은행", ProductType::Deposit, 36, dec!(2.50), dec!(2.70)),
        ]
    }

    fn at(days_after_monday: i64, hour: u32) -> DateTime<Utc> {
        // Monday 2026-02-16 00:00 KST.
        Utc.with_ymd_and_hms(2026, 2, 15, 15, 0, 0).unwrap()
            + Duration::days(days_after_monday)
            + Duration::hours(hour as i64)
    }

    fn point(bank: &str, product: &str, when: DateTime<Utc>, bonus: Decimal) -> ProductObservation {
        let mut o = obs(bank, ProductType::Deposit, 12, dec!(2.00), bonus);
        o.product_name = product.to_string();
        o.collected_at = when;
        o
    }

    #[test]
    fn headline_and_threat() {
        let products = catalog();
        let ranking = rank(&products, ProductType::Deposit, 12, WOORI);

        let h = headline(&ranking);
        assert_eq!(h.top_bank.as_deref(), Some("SC제일은행"));
        assert_eq!(h.top_rate, Some(dec!(3.25)));
        assert_eq!(h.reference_rank, Some(3));
        assert_eq!(h.ranked_banks, 4);
        assert_eq!(h.gap_to_top, Some(dec!(0.25)));

        let threat = threat_alert(&products, &ranking).unwrap();
        assert_eq!(threat.rival_count, 2);
        assert_eq!(threat.top_bank, "SC제일은행");
        assert_eq!(threat.margin, dec!(0.25));
    }

    #[test]
    fn no_threat_when_reference_leads_or_is_missing() {
        let products = catalog();
        let ranking = rank(&products, ProductType::Deposit, 6, WOORI);
        assert!(threat_alert(&products, &ranking).is_none());
        assert_eq!(headline(&ranking).gap_to_top, Some(Decimal::ZERO));

        let ranking = rank(&products, ProductType::Deposit, 24, WOORI);
        assert!(threat_alert(&products, &ranking).is_none());
        let h = headline(&ranking);
        assert_eq!(h.reference_rank, None);
        assert_eq!(h.gap_to_top, None);
    }

    #[test]
    fn adjacent_terms_window() {
        let products = catalog();
        let ranks = adjacent_term_ranks(&products, ProductType::Deposit, 12, WOORI);
        let terms: Vec<_> = ranks.iter().map(|r| r.term_months).collect();
        assert_eq!(terms, [6, 12, 24]);
        assert_eq!(ranks[0].reference_rank, Some(1));
        assert_eq!(ranks[1].reference_rank, Some(3));
        assert!(ranks[1].selected);
        assert_eq!(ranks[2].reference_rank, None);
        assert_eq!(ranks[2].bank_count, 1);

        let edge = adjacent_term_ranks(&products, ProductType::Deposit, 36, WOORI);
        let terms: Vec<_> = edge.iter().map(|r| r.term_months).collect();
        assert_eq!(terms, [24, 36]);

        assert!(adjacent_term_ranks(&products, ProductType::Savings, 12, WOORI).is_empty());
    }

    #[test]
    fn digest_counts_changes_inside_the_week() {
        let history = vec![
            point("SC제일은행", "e-그린세이브예금", at(-3, 0), dec!(2.95)),
            point("SC제일은행", "e-그린세이브예금", at(1, 0), dec!(2.95)),
            point("SC제일은행", "e-그린세이브예금", at(3, 8), dec!(3.25)),
            point("부산은행", "저탄소 실천 예금", at(-2, 0), dec!(2.50)),
            point("부산은행", "저탄소 실천 예금", at(-1, 0), dec!(2.40)),
            point("부산은행", "저탄소 실천 예금", at(1, 7), dec!(2.20)),
            point("부산은행", "더(The) 특판 정기예금", at(1, 9), dec!(2.70)),
        ];
        let digest = weekly_digest(&history, at(0, 0), None);

        assert_eq!(digest.total, 3);
        assert_eq!(digest.launched, 1);
        assert_eq!(digest.raised, 1);
        assert_eq!(digest.lowered, 1);
        assert!(!digest.truncated);

        assert_eq!(digest.items[0].kind, WeeklyChangeKind::Raised);
        assert_eq!(digest.items[0].previous_bonus_rate, Some(dec!(2.95)));
        assert_eq!(digest.items[1].kind, WeeklyChangeKind::Launched);
        assert_eq!(digest.items[1].previous_bonus_rate, None);
        assert_eq!(digest.items[2].kind, WeeklyChangeKind::Lowered);

        let collapsed = weekly_digest(&history, at(0, 0), Some(2));
        assert_eq!(collapsed.total, 3);
        assert_eq!(collapsed.items.len(), 2);
        assert!(collapsed.truncated);
    }

    #[test]
    fn deposit_and_savings_with_one_name_do_not_cross_report() {
        let mut savings_before = point("A", "a", at(-1, 0), dec!(3.50));
        savings_before.product_type = ProductType::Savings;
        let mut savings_after = point("A", "a", at(1, 0), dec!(3.50));
        savings_after.product_type = ProductType::Savings;
        let history = vec![
            point("A", "a", at(-1, 1), dec!(2.50)),
            savings_before,
            point("A", "a", at(1, 1), dec!(2.50)),
            savings_after,
        ];
        let digest = weekly_digest(&history, at(0, 0), None);
        assert_eq!(digest.total, 0);
    }

    #[test]
    fn fresh_history_has_no_launches() {
        let history = vec![
            point("A", "a", at(0, 1), dec!(2.00)),
            point("B", "b", at(0, 1), dec!(2.10)),
        ];
        let digest = weekly_digest(&history, at(0, 0), None);
        assert_eq!(digest.total, 0);
    }

    #[test]
    fn brief_combines_all_sections() {
        let dataset = RateDataset {
            products: catalog(),
            comparison: Vec::new(),
            history: vec![
                point("A", "a", at(-7, 0), dec!(2.00)),
                point("A", "a", at(2, 0), dec!(2.30)),
            ],
            rejected: RejectCounts {
                products: 1,
                comparison: 0,
                history: 2,
            },
            loaded_at: at(3, 0),
        };
        let now = at(3, 9);
        let brief = build_brief(&dataset, &ViewState::default(), WOORI, now).unwrap();
        assert_eq!(brief.headline.reference_rank, Some(3));
        assert_eq!(brief.changes.raised, 1);
        assert_eq!(brief.adjacent_ranks.len(), 3);
        assert_eq!(brief.stats.bank_count, 4);
        assert_eq!(brief.rejected_rows, 3);
        assert_eq!(brief.kst_date, NaiveDate::from_ymd_opt(2026, 2, 19).unwrap());

        let again = build_brief(&dataset, &ViewState::default(), WOORI, now).unwrap();
        assert_eq!(brief, again);
    }
}
