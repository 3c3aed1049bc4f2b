//! Series rows — raw transactional demand and densified monthly points.

use super::key::EntityKey;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One raw transactional demand row, before monthly aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandRecord {
    pub key: EntityKey,
    /// Transaction date at day resolution; truncated to first-of-month
    /// during preparation.
    pub date: NaiveDate,
    pub qty: f64,
}

/// One point of a (densified) monthly demand series.
///
/// Within a densified series there is exactly one point per entity per
/// calendar month of the active window; `month` is always the first of
/// the month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub key: EntityKey,
    pub month: NaiveDate,
    pub qty: f64,
}

impl SeriesPoint {
    pub fn new(key: EntityKey, month: NaiveDate, qty: f64) -> Self {
        Self { key, month, qty }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_point_round_trips_through_serde() {
        let p = SeriesPoint::new(
            EntityKey::new("C", "1", "W", "M", "BAG"),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            12.5,
        );
        let json = serde_json::to_string(&p).unwrap();
        let back: SeriesPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }
}
