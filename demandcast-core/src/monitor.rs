//! Forecast-accuracy monitoring.

use crate::domain::{ForecastRecord, MonitoringRecord, QuantileErrors, SeriesPoint};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Join stored forecasts with observed actuals and compute signed errors.
///
/// A left join keeps every forecast row. `error_q = quantile - actual`, so
/// positive errors are over-forecasts. A forecast month with no actual
/// keeps `None` for the actual and every error, never zero. Either side
/// empty yields an empty result; otherwise the output has exactly one row
/// per forecast row.
pub fn monitor(forecasts: &[ForecastRecord], actuals: &[SeriesPoint]) -> Vec<MonitoringRecord> {
    if forecasts.is_empty() || actuals.is_empty() {
        return Vec::new();
    }

    let mut observed: BTreeMap<(String, NaiveDate), f64> = BTreeMap::new();
    for p in actuals {
        *observed.entry((p.key.canonical(), p.month)).or_insert(0.0) += p.qty;
    }

    forecasts
        .iter()
        .map(|f| {
            let actual = observed
                .get(&(f.key.canonical(), f.month))
                .map(|qty| qty.round() as i64);
            let errors = match actual {
                Some(a) => QuantileErrors(f.quantiles.0.map(|q| Some(q - a))),
                None => QuantileErrors::undefined(),
            };
            MonitoringRecord {
                forecast: f.clone(),
                actual,
                errors,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EntityKey, LoadStamp, Quantiles, Strategy};

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn key(material: &str) -> EntityKey {
        EntityKey::new("CEMENT", "6012", "W001", material, "BAG")
    }

    fn forecast(key: &EntityKey, month: NaiveDate, p50: i64) -> ForecastRecord {
        ForecastRecord {
            key: key.clone(),
            month,
            quantiles: Quantiles([p50 - 20, p50 - 10, p50, p50 + 10, p50 + 20]),
            strategy: Strategy::Model,
            has_recent_sales: true,
            is_forecastable: true,
            is_known: true,
            is_active: true,
            stamp: LoadStamp::new(d(2024, 1), 202401),
        }
    }

    #[test]
    fn signed_error_is_forecast_minus_actual() {
        let k = key("M1");
        let forecasts = vec![forecast(&k, d(2024, 2), 120)];
        let actuals = vec![SeriesPoint::new(k, d(2024, 2), 100.0)];
        let rows = monitor(&forecasts, &actuals);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actual, Some(100));
        assert_eq!(rows[0].errors.0[2], Some(20));
        assert_eq!(rows[0].errors.0[0], Some(0));
        assert_eq!(rows[0].errors.0[4], Some(40));
    }

    #[test]
    fn missing_actual_keeps_none_not_zero() {
        let k = key("M1");
        let forecasts = vec![
            forecast(&k, d(2024, 2), 120),
            forecast(&k, d(2024, 3), 130),
        ];
        let actuals = vec![SeriesPoint::new(k, d(2024, 2), 100.0)];
        let rows = monitor(&forecasts, &actuals);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].actual, None);
        assert!(rows[1].errors.0.iter().all(Option::is_none));
    }

    #[test]
    fn every_forecast_row_survives_the_join() {
        let k1 = key("M1");
        let k2 = key("M2");
        let forecasts = vec![forecast(&k1, d(2024, 2), 10), forecast(&k2, d(2024, 2), 10)];
        let actuals = vec![SeriesPoint::new(k1, d(2024, 2), 5.0)];
        assert_eq!(monitor(&forecasts, &actuals).len(), forecasts.len());
    }

    #[test]
    fn empty_side_yields_empty_output() {
        let k = key("M1");
        let forecasts = vec![forecast(&k, d(2024, 2), 10)];
        assert!(monitor(&forecasts, &[]).is_empty());
        assert!(monitor(&[], &[SeriesPoint::new(k, d(2024, 2), 5.0)]).is_empty());
    }
}
