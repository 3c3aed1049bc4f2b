//! Unified forecast output schema.

use super::key::EntityKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quantile levels produced for every forecast row, in output order.
pub const QUANTILE_LEVELS: [f64; 5] = [0.05, 0.25, 0.5, 0.75, 0.95];

/// The forecasting strategy that produced a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// External trainable predictor (quantile model).
    Model,
    /// Recursive moving-average fallback.
    MovingAverage,
    /// Zero-fill fallback for series without recent sales.
    Zero,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Model => "model",
            Strategy::MovingAverage => "moving_average",
            Strategy::Zero => "zero",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five non-negative integer quantile values at [`QUANTILE_LEVELS`].
///
/// Conceptually non-decreasing in quantile level, but that is not enforced
/// numerically; fallback strategies emit five equal values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantiles(pub [i64; 5]);

impl Quantiles {
    /// All five quantiles set to the same point estimate.
    pub fn flat(value: i64) -> Self {
        Self([value; 5])
    }

    /// Clamp raw model output to >= 0 and round to the nearest integer.
    pub fn from_raw(raw: [f64; 5]) -> Self {
        let mut q = [0i64; 5];
        for (slot, v) in q.iter_mut().zip(raw) {
            *slot = v.max(0.0).round() as i64;
        }
        Self(q)
    }

    pub fn p50(&self) -> i64 {
        self.0[2]
    }
}

/// Load metadata attached to every persisted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStamp {
    /// Calendar date the batch was produced.
    pub load_date: NaiveDate,
    /// Partition period of the batch, as YYYYMM.
    pub load_period: u32,
    /// Soft-delete flag; always false at load time.
    pub deleted: bool,
    /// Deletion bookkeeping date; equals `load_date` until a row is deleted.
    pub deletion_date: NaiveDate,
}

impl LoadStamp {
    pub fn new(load_date: NaiveDate, load_period: u32) -> Self {
        Self {
            load_date,
            load_period,
            deleted: false,
            deletion_date: load_date,
        }
    }
}

/// One row of the unified forecast table: one entity, one future month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub key: EntityKey,
    /// Forecasted month (first of month).
    pub month: NaiveDate,
    pub quantiles: Quantiles,
    pub strategy: Strategy,
    /// Any sale > 0 inside the trailing sales-recency window.
    pub has_recent_sales: bool,
    /// Routed to the model path by the segment/attribute predicate.
    pub is_forecastable: bool,
    /// Present in the reference master list.
    pub is_known: bool,
    /// Present in the current demand universe.
    pub is_active: bool,
    pub stamp: LoadStamp,
}
