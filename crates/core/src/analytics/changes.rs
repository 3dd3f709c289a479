use crate::domain::product::{ProductObservation, ProductType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Which way a single detected change moved the product's rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Raised,
    Lowered,
    /// Base and bonus moved in opposite directions.
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateChangeEvent {
    pub observed_at: DateTime<Utc>,
    pub base_rate: Decimal,
    pub bonus_rate: Decimal,
    pub previous_base_rate: Decimal,
    pub previous_bonus_rate: Decimal,
    pub changed_base: bool,
    pub changed_bonus: bool,
    pub direction: ChangeDirection,
}

/// Emits one event per observation whose base or bonus rate differs from its immediate
/// predecessor. `history` must be sorted ascending by `collected_at`. The first
/// observation has no predecessor and is never an event.
///
/// Rates are compared exactly. The load boundary guarantees fixed precision, so a
/// difference here is a real repricing and not rounding noise.
pub fn detect_changes(history: &[ProductObservation]) -> Vec<RateChangeEvent> {
    history
        .windows(2)
        .filter_map(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            let changed_base = cur.base_rate != prev.base_rate;
            let changed_bonus = cur.bonus_rate != prev.bonus_rate;
            if !changed_base && !changed_bonus {
                return None;
            }
            Some(RateChangeEvent {
                observed_at: cur.collected_at,
                base_rate: cur.base_rate,
                bonus_rate: cur.bonus_rate,
                previous_base_rate: prev.base_rate,
                previous_bonus_rate: prev.bonus_rate,
                changed_base,
                changed_bonus,
                direction: direction_of(
                    cur.base_rate.cmp(&prev.base_rate),
                    cur.bonus_rate.cmp(&prev.bonus_rate),
                ),
            })
        })
        .collect()
}

fn direction_of(base: Ordering, bonus: Ordering) -> ChangeDirection {
    match (base, bonus) {
        (Ordering::Less, Ordering::Greater) | (Ordering::Greater, Ordering::Less) => {
            ChangeDirection::Mixed
        }
        (Ordering::Greater, _) | (_, Ordering::Greater) => ChangeDirection::Raised,
        _ => ChangeDirection::Lowered,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    Risen,
    Fallen,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDriftSummary {
    pub first_bonus_rate: Option<Decimal>,
    pub latest_bonus_rate: Option<Decimal>,
    pub delta: Decimal,
    pub direction: DriftDirection,
}

/// Net bonus-rate drift between the first and the latest observation.
pub fn summarize(history: &[ProductObservation]) -> RateDriftSummary {
    let first = history.first().map(|o| o.bonus_rate);
    let latest = history.last().map(|o| o.bonus_rate);
    let delta = match (first, latest) {
        (Some(f), Some(l)) => l - f,
        _ => Decimal::ZERO,
    };
    let direction = match delta.cmp(&Decimal::ZERO) {
        Ordering::Greater => DriftDirection::Risen,
        Ordering::Less => DriftDirection::Fallen,
        Ordering::Equal => DriftDirection::Unchanged,
    };

    RateDriftSummary {
        first_bonus_rate: first,
        latest_bonus_rate: latest,
        delta,
        direction,
    }
}

/// Identity of one product's time series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub bank_name: String,
    pub product_type: ProductType,
    pub product_name: String,
    pub term_months: i32,
}

impl SeriesKey {
    pub fn of(o: &ProductObservation) -> Self {
        Self {
            bank_name: o.bank_name.clone(),
            product_type: o.product_type,
            product_name: o.product_name.clone(),
            term_months: o.term_months,
        }
    }
}

/// Splits a mixed history into per-product series, each sorted ascending by time.
/// Observations with equal timestamps keep their input order.
pub fn group_series(history: &[ProductObservation]) -> BTreeMap<SeriesKey, Vec<ProductObservation>> {
    let mut out: BTreeMap<SeriesKey, Vec<ProductObservation>> = BTreeMap::new();
    for o in history {
        out.entry(SeriesKey::of(o)).or_default().push(o.clone());
    }
    for series in out.values_mut() {
        series.sort_by_key(|o| o.collected_at);
    }
    out
}

/// The sorted series of one product, optionally narrowed to a product type.
pub fn series_for(
    history: &[ProductObservation],
    bank_name: &str,
    product_name: &str,
    term_months: i32,
    product_type: Option<ProductType>,
) -> Vec<ProductObservation> {
    let mut series: Vec<ProductObservation> = history
        .iter()
        .filter(|o| {
            o.bank_name == bank_name
                && o.product_name == product_name
                && o.term_months == term_months
                && product_type.map_or(true, |t| o.product_type == t)
        })
        .cloned()
        .collect();
    series.sort_by_key(|o| o.collected_at);
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::tests::obs;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn history(points: &[(Decimal, Decimal)]) -> Vec<ProductObservation> {
        let day1 = Utc.with_ymd_and_hms(2026, 2, 16, 0, 0, 0).unwrap();
        points
            .iter()
            .enumerate()
            .map(|(i, (base, bonus))| {
                let mut o = obs("SC제일은행", ProductType::Deposit, 12, *base, *bonus);
                o.product_name = "e-그린세이브예금".to_string();
                o.collected_at = day1 + Duration::days(i as i64);
                o
            })
            .collect()
    }

    #[test]
    fn bonus_rise_on_day_three() {
        let h = history(&[
            (dec!(2.50), dec!(2.95)),
            (dec!(2.50), dec!(2.95)),
            (dec!(2.50), dec!(3.25)),
        ]);
        let events = detect_changes(&h);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].observed_at, h[2].collected_at);
        assert!(!events[0].changed_base);
        assert!(events[0].changed_bonus);
        assert_eq!(events[0].previous_bonus_rate, dec!(2.95));
        assert_eq!(events[0].direction, ChangeDirection::Raised);

        let summary = summarize(&h);
        assert_eq!(summary.delta, dec!(0.30));
        assert_eq!(summary.direction, DriftDirection::Risen);
        assert_eq!(summary.first_bonus_rate, Some(dec!(2.95)));
        assert_eq!(summary.latest_bonus_rate, Some(dec!(3.25)));
    }

    #[test]
    fn first_observation_is_never_an_event() {
        for h in [
            history(&[(dec!(9.00), dec!(9.99))]),
            history(&[(dec!(1.00), dec!(1.00)), (dec!(1.00), dec!(1.00))]),
        ] {
            let events = detect_changes(&h);
            assert!(events.iter().all(|e| e.observed_at != h[0].collected_at));
            assert!(events.is_empty());
        }
    }

    #[test]
    fn event_count_matches_differing_neighbours() {
        let h = history(&[
            (dec!(2.00), dec!(2.50)),
            (dec!(2.10), dec!(2.50)),
            (dec!(2.10), dec!(2.50)),
            (dec!(2.10), dec!(2.40)),
            (dec!(2.00), dec!(2.60)),
            (dec!(2.00), dec!(2.60)),
        ]);
        let expected = h
            .windows(2)
            .filter(|w| w[0].base_rate != w[1].base_rate || w[0].bonus_rate != w[1].bonus_rate)
            .count();
        let events = detect_changes(&h);
        assert_eq!(events.len(), expected);
        assert_eq!(events.len(), 3);

        assert!(events[0].changed_base && !events[0].changed_bonus);
        assert_eq!(events[0].direction, ChangeDirection::Raised);
        assert_eq!(events[1].direction, ChangeDirection::Lowered);
        assert_eq!(events[2].direction, ChangeDirection::Mixed);
    }

    #[test]
    fn trailing_zeros_are_not_a_change() {
        let h = history(&[(dec!(2.5), dec!(3.0)), (dec!(2.50), dec!(3.00))]);
        assert!(detect_changes(&h).is_empty());
    }

    #[test]
    fn empty_and_single_histories_are_unchanged() {
        let empty = summarize(&[]);
        assert_eq!(empty.delta, Decimal::ZERO);
        assert_eq!(empty.direction, DriftDirection::Unchanged);
        assert_eq!(empty.first_bonus_rate, None);
        assert!(detect_changes(&[]).is_empty());

        let single = history(&[(dec!(2.00), dec!(2.50))]);
        let summary = summarize(&single);
        assert_eq!(summary.delta, Decimal::ZERO);
        assert_eq!(summary.direction, DriftDirection::Unchanged);
    }

    #[test]
    fn fallen_drift() {
        let h = history(&[(dec!(2.50), dec!(2.50)), (dec!(2.20), dec!(2.20))]);
        let summary = summarize(&h);
        assert_eq!(summary.delta, dec!(-0.30));
        assert_eq!(summary.direction, DriftDirection::Fallen);
    }

    #[test]
    fn groups_and_sorts_series() {
        let mut h = history(&[(dec!(2.00), dec!(2.50)), (dec!(2.00), dec!(2.60))]);
        h.reverse();
        let mut other = obs("부산은행", ProductType::Savings, 36, dec!(2.00), dec!(2.50));
        other.product_name = "저탄소 실천 적금".to_string();
        h.push(other);

        let grouped = group_series(&h);
        assert_eq!(grouped.len(), 2);
        let sc = grouped
            .iter()
            .find(|(k, _)| k.bank_name == "SC제일은행")
            .map(|(_, v)| v)
            .unwrap();
        assert!(sc[0].collected_at < sc[1].collected_at);

        let one = series_for(&h, "SC제일은행", "e-그린세이브예금", 12, Some(ProductType::Deposit));
        assert_eq!(one.len(), 2);
        assert_eq!(one[1].bonus_rate, dec!(2.60));
        assert!(series_for(&h, "SC제일은행", "e-그린세이브예금", 12, Some(ProductType::Savings)).is_empty());
    }

    #[test]
    fn same_name_across_product_types_stays_separate() {
        let mut h = history(&[(dec!(2.00), dec!(2.50)), (dec!(2.00), dec!(2.50))]);
        let mut savings = h.clone();
        for o in &mut savings {
            o.product_type = ProductType::Savings;
            o.bonus_rate = dec!(3.50);
        }
        h.insert(1, savings[0].clone());
        h.push(savings[1].clone());

        let grouped = group_series(&h);
        assert_eq!(grouped.len(), 2);
        for series in grouped.values() {
            assert_eq!(series.len(), 2);
            assert!(detect_changes(series).is_empty());
        }
    }
}
