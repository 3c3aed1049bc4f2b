//! Monitoring rows — forecast reconciled against realized demand.

use super::forecast::ForecastRecord;
use serde::{Deserialize, Serialize};

/// Signed quantile errors (forecast quantile minus actual).
///
/// `None` means the actual for that month was absent; an undefined error is
/// representable and must never be coerced to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantileErrors(pub [Option<i64>; 5]);

impl QuantileErrors {
    pub fn undefined() -> Self {
        Self([None; 5])
    }
}

/// One monitoring row: the original forecast row plus the realized value
/// and the per-quantile errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringRecord {
    pub forecast: ForecastRecord,
    /// Realized demand for the forecasted month, when available.
    pub actual: Option<i64>,
    pub errors: QuantileErrors,
}
