//! ABC-XYZ-FSN demand segmentation over a trailing window.
//!
//! ABC (value concentration) is computed per warehouse group, so the same
//! material can rank differently per site; XYZ (variability) and FSN
//! (turnover) are computed per entity from its own window.

mod abc;
mod metrics;

pub use abc::classify_abc;
pub use metrics::{coefficient_of_variation, turnover_rate};

use crate::calendar::MonthWindow;
use crate::domain::{AbcClass, EntityKey, FsnClass, SegmentLabel, SeriesPoint, XyzClass};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Segment boundary thresholds. Each pair is (lower, upper).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentThresholds {
    /// Cumulative value share boundaries for A and B.
    pub abc: (f64, f64),
    /// Coefficient-of-variation boundaries for X and Y.
    pub xyz: (f64, f64),
    /// Turnover boundaries for S and F.
    pub fsn: (f64, f64),
}

impl Default for SegmentThresholds {
    fn default() -> Self {
        Self {
            abc: (0.80, 0.95),
            xyz: (0.35, 0.80),
            fsn: (2.0, 6.0),
        }
    }
}

/// Variability class from a coefficient of variation.
///
/// An undefined metric (no-sales series, reported as 0) is stable by
/// convention and lands in X.
pub fn classify_xyz(cv: f64, threshold_a: f64, threshold_b: f64) -> XyzClass {
    if cv <= threshold_a {
        XyzClass::X
    } else if cv <= threshold_b {
        XyzClass::Y
    } else {
        XyzClass::Z
    }
}

/// Turnover class from an annualized turnover rate.
pub fn classify_fsn(turnover: f64, threshold_a: f64, threshold_b: f64) -> FsnClass {
    if turnover >= threshold_b {
        FsnClass::F
    } else if turnover >= threshold_a {
        FsnClass::S
    } else {
        FsnClass::N
    }
}

/// Segment every entity in `points` over the trailing `window_months`
/// window ending at the latest observed month.
///
/// Returns one label row per entity, sorted by key. Entity metrics are
/// independent and computed in parallel; ABC ranking then runs per
/// warehouse group.
pub fn segment(
    points: &[SeriesPoint],
    window_months: u32,
    thresholds: &SegmentThresholds,
) -> Vec<SegmentLabel> {
    let Some(last) = points.iter().map(|p| p.month).max() else {
        return Vec::new();
    };
    let window = MonthWindow::trailing(last, window_months);

    // Month-ordered window values per entity.
    let mut per_entity: BTreeMap<&EntityKey, BTreeMap<chrono::NaiveDate, f64>> = BTreeMap::new();
    for p in points.iter().filter(|p| window.contains(p.month)) {
        *per_entity.entry(&p.key).or_default().entry(p.month).or_insert(0.0) += p.qty;
    }

    let entities: Vec<(&EntityKey, Vec<f64>)> = per_entity
        .into_iter()
        .map(|(key, by_month)| (key, by_month.into_values().collect()))
        .collect();

    let measured: Vec<(EntityKey, f64, f64, f64)> = entities
        .par_iter()
        .map(|(key, values)| {
            let total: f64 = values.iter().sum();
            let cv = coefficient_of_variation(values);
            let rot = turnover_rate(values);
            ((*key).clone(), total, cv, rot)
        })
        .collect();

    // ABC per warehouse group, aligned back by index.
    let mut group_indices: BTreeMap<(String, String, String), Vec<usize>> = BTreeMap::new();
    for (i, (key, ..)) in measured.iter().enumerate() {
        group_indices.entry(key.warehouse_group()).or_default().push(i);
    }
    let mut abc_labels = vec![AbcClass::C; measured.len()];
    for indices in group_indices.values() {
        let totals: Vec<f64> = indices.iter().map(|&i| measured[i].1).collect();
        let labels = classify_abc(&totals, thresholds.abc.0, thresholds.abc.1);
        for (&i, label) in indices.iter().zip(labels) {
            abc_labels[i] = label;
        }
    }

    measured
        .into_iter()
        .zip(abc_labels)
        .map(|((key, total, cv, rot), abc)| SegmentLabel {
            key,
            window_months,
            value_total: total,
            cv,
            turnover: rot,
            abc,
            xyz: classify_xyz(cv, thresholds.xyz.0, thresholds.xyz.1),
            fsn: classify_fsn(rot, thresholds.fsn.0, thresholds.fsn.1),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn key(site: &str, material: &str) -> EntityKey {
        EntityKey::new("CEMENT", "6012", site, material, "BAG")
    }

    fn series(key: &EntityKey, values: &[f64]) -> Vec<SeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &qty)| SeriesPoint::new(key.clone(), d(2024, i as u32 + 1), qty))
            .collect()
    }

    #[test]
    fn xyz_thresholds_are_inclusive_on_the_boundary() {
        assert_eq!(classify_xyz(0.35, 0.35, 0.80), XyzClass::X);
        assert_eq!(classify_xyz(0.80, 0.35, 0.80), XyzClass::Y);
        assert_eq!(classify_xyz(0.81, 0.35, 0.80), XyzClass::Z);
    }

    #[test]
    fn fsn_thresholds_are_inclusive_on_the_boundary() {
        assert_eq!(classify_fsn(6.0, 2.0, 6.0), FsnClass::F);
        assert_eq!(classify_fsn(2.0, 2.0, 6.0), FsnClass::S);
        assert_eq!(classify_fsn(1.9999, 2.0, 6.0), FsnClass::N);
    }

    #[test]
    fn segment_produces_one_label_per_entity() {
        let k1 = key("W001", "M1");
        let k2 = key("W001", "M2");
        let mut points = series(&k1, &[10.0; 12]);
        points.extend(series(&k2, &[1.0; 12]));
        let labels = segment(&points, 12, &SegmentThresholds::default());
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|l| l.window_months == 12));
    }

    #[test]
    fn steady_fast_mover_is_a_x_f() {
        let k1 = key("W001", "M1");
        let k2 = key("W001", "M2");
        // k1 dominates value; both sell every month with zero spread.
        let mut points = series(&k1, &[100.0; 12]);
        points.extend(series(&k2, &[1.0; 12]));
        let labels = segment(&points, 12, &SegmentThresholds::default());
        let l1 = labels.iter().find(|l| l.key == k1).unwrap();
        assert_eq!(l1.abc, AbcClass::A);
        assert_eq!(l1.xyz, XyzClass::X);
        assert_eq!(l1.fsn, FsnClass::F);
        assert_eq!(l1.value_total, 1200.0);
    }

    #[test]
    fn dead_series_is_x_n_with_zero_metrics() {
        let k1 = key("W001", "M1");
        let k2 = key("W001", "M2");
        let mut points = series(&k1, &[10.0; 12]);
        points.extend(series(&k2, &[0.0; 12]));
        let labels = segment(&points, 12, &SegmentThresholds::default());
        let dead = labels.iter().find(|l| l.key == k2).unwrap();
        assert_eq!(dead.cv, 0.0);
        assert_eq!(dead.turnover, 0.0);
        assert_eq!(dead.xyz, XyzClass::X);
        assert_eq!(dead.fsn, FsnClass::N);
    }

    #[test]
    fn abc_ranks_within_each_warehouse_group_separately() {
        // The same 10-unit material is the biggest in W002 but small in W001.
        let big = key("W001", "M1");
        let small_w1 = key("W001", "M2");
        let alone_w2 = key("W002", "M2");
        let mut points = series(&big, &[100.0; 12]);
        points.extend(series(&small_w1, &[10.0; 12]));
        points.extend(series(&alone_w2, &[10.0; 12]));
        let labels = segment(&points, 12, &SegmentThresholds::default());
        let w1_small = labels.iter().find(|l| l.key == small_w1).unwrap();
        let w2 = labels.iter().find(|l| l.key == alone_w2).unwrap();
        assert_eq!(w1_small.abc, AbcClass::C);
        // Sole entity in its group crosses both thresholds at once.
        assert_eq!(w2.abc, AbcClass::C);
    }

    #[test]
    fn segment_window_excludes_older_months() {
        let k1 = key("W001", "M1");
        // 13 months; the first (2024-01) falls outside a 12-month window
        // ending at 2025-01.
        let mut points = series(&k1, &[500.0; 12]);
        points.push(SeriesPoint::new(k1.clone(), d(2025, 1), 10.0));
        let labels = segment(&points, 12, &SegmentThresholds::default());
        assert_eq!(labels[0].value_total, 500.0 * 11.0 + 10.0);
    }

    #[test]
    fn segment_of_empty_input_is_empty() {
        assert!(segment(&[], 12, &SegmentThresholds::default()).is_empty());
    }
}
