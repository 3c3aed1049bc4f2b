//! Series preparation: monthly aggregation and calendar-gap completion.
//!
//! Raw transactional rows arrive at day resolution with arbitrary gaps.
//! Preparation truncates them to months, sums per (entity, month), and
//! densifies the result over a calendar window so every entity has exactly
//! one point per month in range.

use crate::calendar::{month_floor, MonthWindow};
use crate::domain::{DemandRecord, EntityKey, SeriesPoint};
use crate::routing::AttributeFilter;
use std::collections::{BTreeMap, BTreeSet};

/// Aggregate raw transactions into per-(entity, month) sums.
///
/// Rows failing any attribute filter are dropped before aggregation.
/// Non-finite quantities are treated as zero (absent sales), matching the
/// imputation applied to missing months downstream.
pub fn monthly_series(records: &[DemandRecord], filters: &[AttributeFilter]) -> Vec<SeriesPoint> {
    let mut sums: BTreeMap<(EntityKey, chrono::NaiveDate), f64> = BTreeMap::new();
    for rec in records {
        if !filters.iter().all(|f| f.matches(&rec.key)) {
            continue;
        }
        let qty = if rec.qty.is_finite() { rec.qty } else { 0.0 };
        *sums.entry((rec.key.clone(), month_floor(rec.date))).or_insert(0.0) += qty;
    }
    sums.into_iter()
        .map(|((key, month), qty)| SeriesPoint::new(key, month, qty))
        .collect()
}

/// Densify a monthly series over `window`.
///
/// Every entity seen in the input gets exactly one point per month of the
/// window: the existing aggregate where one exists (even when it is zero),
/// 0.0 where the month is strictly absent. Points outside the window are
/// dropped. Output is sorted by (entity, month); re-running on an already
/// dense series is a no-op besides ordering.
pub fn complete_months(points: &[SeriesPoint], window: &MonthWindow) -> Vec<SeriesPoint> {
    let keys: BTreeSet<&EntityKey> = points.iter().map(|p| &p.key).collect();
    let mut existing: BTreeMap<(&EntityKey, chrono::NaiveDate), f64> = BTreeMap::new();
    for p in points {
        // Duplicate months collapse by summation, same as the aggregation step.
        *existing.entry((&p.key, p.month)).or_insert(0.0) += p.qty;
    }

    let months = window.months();
    let mut out = Vec::with_capacity(keys.len() * months.len());
    for key in keys {
        for &month in &months {
            let qty = existing.get(&(key, month)).copied().unwrap_or(0.0);
            out.push(SeriesPoint::new(key.clone(), month, qty));
        }
    }
    out
}

/// Monthly aggregation followed by completion over the trailing window
/// ending at the latest observed month.
pub fn prepare(
    records: &[DemandRecord],
    filters: &[AttributeFilter],
    window_months: u32,
) -> Vec<SeriesPoint> {
    let monthly = monthly_series(records, filters);
    let Some(last) = monthly.iter().map(|p| p.month).max() else {
        return Vec::new();
    };
    let window = MonthWindow::trailing(last, window_months);
    complete_months(&monthly, &window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn key(material: &str) -> EntityKey {
        EntityKey::new("CEMENT", "6012", "W001", material, "BAG")
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monthly_series_truncates_and_sums() {
        let records = vec![
            DemandRecord { key: key("M1"), date: d(2024, 1, 3), qty: 5.0 },
            DemandRecord { key: key("M1"), date: d(2024, 1, 28), qty: 7.0 },
            DemandRecord { key: key("M1"), date: d(2024, 2, 10), qty: 1.0 },
        ];
        let monthly = monthly_series(&records, &[]);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].month, d(2024, 1, 1));
        assert_eq!(monthly[0].qty, 12.0);
        assert_eq!(monthly[1].qty, 1.0);
    }

    #[test]
    fn attribute_filters_drop_rows_before_aggregation() {
        let mut other = key("M1");
        other.uom = "TON".into();
        let records = vec![
            DemandRecord { key: key("M1"), date: d(2024, 1, 3), qty: 5.0 },
            DemandRecord { key: other, date: d(2024, 1, 3), qty: 99.0 },
        ];
        let filters = vec![AttributeFilter::new("uom", ["BAG"])];
        let monthly = monthly_series(&records, &filters);
        assert_eq!(monthly.len(), 1);
        assert_eq!(monthly[0].qty, 5.0);
    }

    #[test]
    fn completion_fills_the_gap_month_with_zero() {
        // Jan and Mar present, window Jan..Mar: Feb imputed, Jan/Mar kept.
        let points = vec![
            SeriesPoint::new(key("M1"), d(2024, 1, 1), 10.0),
            SeriesPoint::new(key("M1"), d(2024, 3, 1), 30.0),
        ];
        let window = MonthWindow::new(d(2024, 1, 1), d(2024, 3, 1));
        let dense = complete_months(&points, &window);
        assert_eq!(dense.len(), 3);
        assert_eq!(dense[0].qty, 10.0);
        assert_eq!(dense[1].month, d(2024, 2, 1));
        assert_eq!(dense[1].qty, 0.0);
        assert_eq!(dense[2].qty, 30.0);
    }

    #[test]
    fn completion_never_overwrites_an_existing_zero_actual() {
        let points = vec![
            SeriesPoint::new(key("M1"), d(2024, 1, 1), 0.0),
            SeriesPoint::new(key("M1"), d(2024, 2, 1), 4.0),
        ];
        let window = MonthWindow::new(d(2024, 1, 1), d(2024, 2, 1));
        let dense = complete_months(&points, &window);
        assert_eq!(dense[0].qty, 0.0);
        assert_eq!(dense[1].qty, 4.0);
    }

    #[test]
    fn completion_is_idempotent_on_dense_input() {
        let points = vec![
            SeriesPoint::new(key("M1"), d(2024, 1, 1), 10.0),
            SeriesPoint::new(key("M1"), d(2024, 3, 1), 30.0),
        ];
        let window = MonthWindow::new(d(2024, 1, 1), d(2024, 3, 1));
        let once = complete_months(&points, &window);
        let twice = complete_months(&once, &window);
        assert_eq!(once, twice);
    }

    #[test]
    fn completion_covers_every_entity_seen_in_input() {
        let points = vec![
            SeriesPoint::new(key("M1"), d(2024, 1, 1), 1.0),
            SeriesPoint::new(key("M2"), d(2024, 2, 1), 2.0),
        ];
        let window = MonthWindow::new(d(2024, 1, 1), d(2024, 2, 1));
        let dense = complete_months(&points, &window);
        assert_eq!(dense.len(), 4);
    }

    #[test]
    fn prepare_on_empty_input_is_empty() {
        assert!(prepare(&[], &[], 12).is_empty());
    }
}
