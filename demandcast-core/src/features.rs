//! Feature engineering for the trainable predictor.
//!
//! Three covariate groups are produced from a dense monthly series: lagged
//! and rolling-mean demand features, calendar features that are known in
//! advance for any future month, and static segment labels. The future
//! skeleton handed to the predictor carries only the known-in-advance
//! group.

use crate::calendar::add_months;
use crate::domain::{AbcClass, EntityKey, FsnClass, SegmentLabel, SeriesPoint, XyzClass};
use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::TAU;

/// Names of the known-in-advance calendar covariates, in column order.
pub const KNOWN_COVARIATES: [&str; 12] = [
    "month",
    "month_sin",
    "month_cos",
    "quarter",
    "quarter_sin",
    "quarter_cos",
    "half",
    "half_sin",
    "half_cos",
    "month_index",
    "month_index_sq",
    "month_index_ln1p",
];

/// Calendar covariates for one month, relative to the frame origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalendarRow {
    pub month_of_year: u32,
    pub month_sin: f64,
    pub month_cos: f64,
    pub quarter: u32,
    pub quarter_sin: f64,
    pub quarter_cos: f64,
    pub half: u32,
    pub half_sin: f64,
    pub half_cos: f64,
    /// Linear month counter from the frame origin, starting at 0.
    pub month_index: f64,
    pub month_index_sq: f64,
    pub month_index_ln1p: f64,
}

impl CalendarRow {
    /// Compute the covariates of `month` with counters anchored at `origin`.
    pub fn compute(month: NaiveDate, origin: NaiveDate) -> Self {
        let m = month.month();
        let quarter = (m - 1) / 3 + 1;
        let half = (m - 1) / 6 + 1;
        let idx = months_between(origin, month) as f64;
        let cycle = |pos: u32, len: f64| {
            let phase = TAU * pos as f64 / len;
            (phase.sin(), phase.cos())
        };
        let (month_sin, month_cos) = cycle(m, 12.0);
        let (quarter_sin, quarter_cos) = cycle(quarter, 4.0);
        let (half_sin, half_cos) = cycle(half, 2.0);
        Self {
            month_of_year: m,
            month_sin,
            month_cos,
            quarter,
            quarter_sin,
            quarter_cos,
            half,
            half_sin,
            half_cos,
            month_index: idx,
            month_index_sq: idx * idx,
            month_index_ln1p: (1.0 + idx).ln(),
        }
    }

    /// Values in [`KNOWN_COVARIATES`] order.
    pub fn values(&self) -> [f64; 12] {
        [
            self.month_of_year as f64,
            self.month_sin,
            self.month_cos,
            self.quarter as f64,
            self.quarter_sin,
            self.quarter_cos,
            self.half as f64,
            self.half_sin,
            self.half_cos,
            self.month_index,
            self.month_index_sq,
            self.month_index_ln1p,
        ]
    }
}

fn months_between(origin: NaiveDate, month: NaiveDate) -> i64 {
    (month.year() as i64 * 12 + month.month() as i64)
        - (origin.year() as i64 * 12 + origin.month() as i64)
}

/// Static covariates carried per entity: its current segment labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCovariates {
    pub abc: AbcClass,
    pub xyz: XyzClass,
    pub fsn: FsnClass,
}

/// One training row: target plus all engineered covariates.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub key: EntityKey,
    pub month: NaiveDate,
    pub target: f64,
    /// Lagged targets, lag 1 first.
    pub lags: Vec<f64>,
    /// Rolling means of the 1-shifted target, smallest window first.
    pub window_means: Vec<f64>,
    pub calendar: CalendarRow,
}

/// One future row: a month with only its known-in-advance covariates.
#[derive(Debug, Clone, PartialEq)]
pub struct FutureRow {
    pub key: EntityKey,
    pub month: NaiveDate,
    pub calendar: CalendarRow,
}

/// The engineered training frame for one population.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureFrame {
    /// Earliest month across the frame; anchors the linear counters.
    pub origin: Option<NaiveDate>,
    pub rows: Vec<FeatureRow>,
    /// Segment labels keyed by canonical entity id.
    pub statics: BTreeMap<String, StaticCovariates>,
}

impl FeatureFrame {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Last observed month per entity, for building the future skeleton.
    fn last_months(&self) -> BTreeMap<&EntityKey, NaiveDate> {
        let mut last: BTreeMap<&EntityKey, NaiveDate> = BTreeMap::new();
        for row in &self.rows {
            let entry = last.entry(&row.key).or_insert(row.month);
            if row.month > *entry {
                *entry = row.month;
            }
        }
        last
    }
}

/// Build the training frame for `points`, a dense monthly series.
///
/// Lag depth and rolling windows are sized from the forecast horizon: lags
/// 1 through `horizon - 1`, rolling windows 2 through `horizon - 1` over
/// the 1-shifted series. Rows at the start of each entity's history where
/// a lag or rolling value does not yet exist are filled by linear
/// interpolation of internal gaps, then forward fill, then backward fill.
pub fn build_frame(
    points: &[SeriesPoint],
    labels: &[SegmentLabel],
    horizon: u32,
) -> FeatureFrame {
    let origin = points.iter().map(|p| p.month).min();
    let Some(origin) = origin else {
        return FeatureFrame::default();
    };
    let max_lag = horizon.saturating_sub(1).max(1) as usize;

    let mut per_entity: BTreeMap<&EntityKey, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for p in points {
        *per_entity.entry(&p.key).or_default().entry(p.month).or_insert(0.0) += p.qty;
    }
    let entities: Vec<(&EntityKey, BTreeMap<NaiveDate, f64>)> = per_entity.into_iter().collect();

    let rows: Vec<FeatureRow> = entities
        .par_iter()
        .flat_map(|(key, by_month)| {
            let months: Vec<NaiveDate> = by_month.keys().copied().collect();
            let target: Vec<f64> = by_month.values().copied().collect();
            let n = target.len();

            // Lag columns, then rolling means of the 1-shifted series.
            let mut columns: Vec<Vec<Option<f64>>> = Vec::new();
            for lag in 1..=max_lag {
                let col = (0..n)
                    .map(|i| i.checked_sub(lag).map(|j| target[j]))
                    .collect();
                columns.push(col);
            }
            for window in 2..=max_lag {
                let col = (0..n)
                    .map(|i| {
                        if i >= window {
                            let slice = &target[i - window..i];
                            Some(slice.iter().sum::<f64>() / window as f64)
                        } else {
                            None
                        }
                    })
                    .collect();
                columns.push(col);
            }
            let filled: Vec<Vec<f64>> = columns.into_iter().map(fill_gaps).collect();

            let lag_count = max_lag;
            (0..n)
                .map(|i| FeatureRow {
                    key: (*key).clone(),
                    month: months[i],
                    target: target[i],
                    lags: filled[..lag_count].iter().map(|c| c[i]).collect(),
                    window_means: filled[lag_count..].iter().map(|c| c[i]).collect(),
                    calendar: CalendarRow::compute(months[i], origin),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let statics = labels
        .iter()
        .map(|l| {
            (
                l.key.canonical(),
                StaticCovariates { abc: l.abc, xyz: l.xyz, fsn: l.fsn },
            )
        })
        .collect();

    FeatureFrame { origin: Some(origin), rows, statics }
}

/// Future skeleton: `horizon` months past each entity's last observed
/// month, carrying only known-in-advance covariates. Counters keep the
/// training frame's origin so the linear trend continues smoothly.
pub fn future_frame(frame: &FeatureFrame, horizon: u32) -> Vec<FutureRow> {
    let Some(origin) = frame.origin else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (key, last) in frame.last_months() {
        for step in 1..=horizon as i32 {
            let month = add_months(last, step);
            out.push(FutureRow {
                key: key.clone(),
                month,
                calendar: CalendarRow::compute(month, origin),
            });
        }
    }
    out
}

/// Fill missing values: linear interpolation of internal gaps, then
/// forward fill, then backward fill. An all-missing column becomes 0.0.
fn fill_gaps(column: Vec<Option<f64>>) -> Vec<f64> {
    let n = column.len();
    let mut out = vec![f64::NAN; n];
    let mut prev: Option<(usize, f64)> = None;
    for i in 0..n {
        if let Some(v) = column[i] {
            if let Some((j, pv)) = prev {
                if i - j > 1 {
                    let span = (i - j) as f64;
                    for (offset, slot) in out[j + 1..i].iter_mut().enumerate() {
                        let t = (offset + 1) as f64 / span;
                        *slot = pv + (v - pv) * t;
                    }
                }
            }
            out[i] = v;
            prev = Some((i, v));
        }
    }
    // Forward fill past the last observation, backward fill before the
    // first.
    let mut last = None;
    for slot in out.iter_mut() {
        if slot.is_nan() {
            if let Some(v) = last {
                *slot = v;
            }
        } else {
            last = Some(*slot);
        }
    }
    let mut next = None;
    for slot in out.iter_mut().rev() {
        if slot.is_nan() {
            *slot = next.unwrap_or(0.0);
        } else {
            next = Some(*slot);
        }
    }
    out
}
