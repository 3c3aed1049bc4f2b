//! Per-entity demand metrics: coefficient of variation and turnover rate.

/// Round to 4 decimal places, the precision segment metrics are stored at.
pub(crate) fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Coefficient of variation of the months with sales.
///
/// Only months with value > 0 enter the calculation. With fewer than two
/// such months (or a zero mean) the variation is undefined and reported
/// as 0. Uses the sample standard deviation.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let nonzero: Vec<f64> = values.iter().copied().filter(|v| *v > 0.0).collect();
    if nonzero.len() <= 1 {
        return 0.0;
    }
    let n = nonzero.len() as f64;
    let mean = nonzero.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return 0.0;
    }
    let var = nonzero.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    round4(var.sqrt() / mean)
}

/// Annualized turnover rate: months with sales, scaled to a 12-month year.
///
/// A 12-month window with 3 selling months yields 3.0; a 6-month window
/// with 3 selling months yields 6.0.
pub fn turnover_rate(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let selling = values.iter().filter(|v| **v > 0.0).count();
    round4(selling as f64 * 12.0 / values.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cv_ignores_zero_months() {
        // Nonzero subset [10, 10] has zero spread.
        assert_eq!(coefficient_of_variation(&[0.0, 10.0, 0.0, 10.0]), 0.0);
    }

    #[test]
    fn cv_is_zero_for_at_most_one_selling_month() {
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 42.0]), 0.0);
    }

    #[test]
    fn cv_matches_sample_stddev_over_mean() {
        // [10, 20]: mean 15, sample std sqrt(50) ~ 7.0711, cv ~ 0.4714
        assert_eq!(coefficient_of_variation(&[10.0, 20.0]), 0.4714);
    }

    #[test]
    fn cv_rounds_to_four_decimals() {
        let cv = coefficient_of_variation(&[1.0, 2.0, 3.0]);
        assert_eq!(cv, 0.5);
    }

    #[test]
    fn turnover_annualizes_partial_windows() {
        let mut window = vec![0.0; 12];
        window[1] = 5.0;
        window[4] = 1.0;
        window[9] = 2.0;
        assert_eq!(turnover_rate(&window), 3.0);

        // 3 selling months out of 6 annualizes to 6.
        assert_eq!(turnover_rate(&[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]), 6.0);
    }

    #[test]
    fn turnover_of_empty_window_is_zero() {
        assert_eq!(turnover_rate(&[]), 0.0);
    }
}
