//! Segment labels — ABC (value concentration), XYZ (variability), FSN (turnover).

use super::key::EntityKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value-concentration class. A carries the highest cumulative value share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbcClass {
    A,
    B,
    C,
}

/// Demand-variability class. X is stable, Z is erratic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum XyzClass {
    X,
    Y,
    Z,
}

/// Turnover class. F is fast-moving, N has no turnover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FsnClass {
    F,
    S,
    N,
}

impl fmt::Display for AbcClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AbcClass::A => "A",
            AbcClass::B => "B",
            AbcClass::C => "C",
        })
    }
}

impl fmt::Display for XyzClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            XyzClass::X => "X",
            XyzClass::Y => "Y",
            XyzClass::Z => "Z",
        })
    }
}

impl fmt::Display for FsnClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FsnClass::F => "F",
            FsnClass::S => "S",
            FsnClass::N => "N",
        })
    }
}

/// Per-entity segmentation result over a trailing window.
///
/// Recomputed every run over the window ending at the latest observed
/// month; only the latest labels are kept, never a history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentLabel {
    pub key: EntityKey,
    /// Trailing window length in months the metrics were computed over.
    pub window_months: u32,
    /// Accumulated demand value over the window.
    pub value_total: f64,
    /// Coefficient of variation of the nonzero months, rounded to 4 decimals.
    pub cv: f64,
    /// Annualized turnover rate, rounded to 4 decimals.
    pub turnover: f64,
    pub abc: AbcClass,
    pub xyz: XyzClass,
    pub fsn: FsnClass,
}
