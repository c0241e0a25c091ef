//! Statistical primitives shared by both estimators.
//!
//! None of these functions fail: empty or too-short inputs yield neutral
//! values (0 or the input unchanged), and the estimators decide whether the
//! data is sufficient.

/// Arithmetic mean. Returns 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation. Returns 0 for fewer than 2 values.
pub fn stddev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Coefficient of variation (stddev / mean). Returns 0 when the mean is 0.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m == 0.0 {
        return 0.0;
    }
    stddev(values) / m.abs()
}

/// Median of the values, averaging the two middle elements for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Ordinary least squares slope of `series[i]` against `i`.
///
/// Points are assumed equally spaced. Returns 0 for fewer than 2 points.
pub fn linear_regression_slope(series: &[f64]) -> f64 {
    let points: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .map(|(i, y)| (i as f64, *y))
        .collect();
    slope_of_points(&points)
}

/// Ordinary least squares slope of `y` against `x` for `(x, y)` points.
///
/// Returns 0 for fewer than 2 points or when every `x` is the same.
pub fn slope_of_points(points: &[(f64, f64)]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, y) in points {
        let dx = x - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Centered moving average with the window truncated at the boundaries.
///
/// Each output averages `window_size` points around `i`, clipped to the
/// slice. Odd windows are symmetric; even windows take one more point after
/// `i` than before it. A series no longer than the window is returned
/// unchanged.
pub fn moving_average_smooth(series: &[f64], window_size: usize) -> Vec<f64> {
    if series.len() <= window_size || window_size <= 1 {
        return series.to_vec();
    }

    let before = (window_size - 1) / 2;
    let after = window_size / 2;
    (0..series.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after + 1).min(series.len());
            mean(&series[start..end])
        })
        .collect()
}

/// Exponential moving average over a series with gaps.
///
/// The EMA starts at the first observation and carries forward unchanged
/// across `None` entries. Entries before the first observation stay `None`.
pub fn exponential_moving_average(values: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut ema: Option<f64> = None;

    values
        .iter()
        .map(|value| {
            ema = match (ema, value) {
                (None, Some(v)) => Some(*v),
                (Some(prev), Some(v)) => Some(alpha * v + (1.0 - alpha) * prev),
                (prev, None) => prev,
            };
            ema
        })
        .collect()
}

/// Rounds to the given number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper to check floating point equality with tolerance
    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_mean_empty() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_mean_values() {
        assert!(approx_eq(mean(&[1.0, 2.0, 3.0, 4.0]), 2.5, 1e-12));
    }

    #[test]
    fn test_stddev_floor() {
        // Fewer than two values is a deliberate zero, not NaN
        assert_eq!(stddev(&[]), 0.0);
        assert_eq!(stddev(&[42.0]), 0.0);
    }

    #[test]
    fn test_stddev_population() {
        // Population stddev of 2, 4, 4, 4, 5, 5, 7, 9 is exactly 2
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx_eq(stddev(&values), 2.0, 1e-12));
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert_eq!(coefficient_of_variation(&[]), 0.0);
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), 0.0);
        let cv = coefficient_of_variation(&[1800.0, 2000.0]);
        assert!(approx_eq(cv, 100.0 / 1900.0, 1e-12));
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_slope_two_points() {
        assert_eq!(linear_regression_slope(&[3.0, 7.5]), 4.5);
        assert_eq!(linear_regression_slope(&[90.0, 89.0]), -1.0);
    }

    #[test]
    fn test_slope_short_series() {
        assert_eq!(linear_regression_slope(&[]), 0.0);
        assert_eq!(linear_regression_slope(&[5.0]), 0.0);
    }

    #[test]
    fn test_slope_linear_series() {
        let series: Vec<f64> = (0..20).map(|i| 90.0 - 0.1 * i as f64).collect();
        assert!(approx_eq(linear_regression_slope(&series), -0.1, 1e-9));
    }

    #[test]
    fn test_slope_of_uneven_points() {
        // Weigh-ins 4 days apart losing 0.1 kg/day
        let points: Vec<(f64, f64)> = (0..5)
            .map(|i| (4.0 * i as f64, 80.0 - 0.4 * i as f64))
            .collect();
        assert!(approx_eq(slope_of_points(&points), -0.1, 1e-9));
    }

    #[test]
    fn test_slope_of_points_degenerate() {
        assert_eq!(slope_of_points(&[]), 0.0);
        assert_eq!(slope_of_points(&[(3.0, 80.0), (3.0, 81.0)]), 0.0);
    }

    #[test]
    fn test_smooth_constant_series() {
        let series = vec![72.4; 10];
        for window in [1, 3, 5, 7] {
            let smoothed = moving_average_smooth(&series, window);
            assert_eq!(smoothed.len(), series.len());
            for value in smoothed {
                assert!(approx_eq(value, 72.4, 1e-12));
            }
        }
    }

    #[test]
    fn test_smooth_short_series_unchanged() {
        let series = vec![80.0, 81.0, 79.0];
        assert_eq!(moving_average_smooth(&series, 3), series);
        assert_eq!(moving_average_smooth(&series, 5), series);
    }

    #[test]
    fn test_smooth_truncates_at_boundaries() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let smoothed = moving_average_smooth(&series, 3);

        // First and last windows only have two elements
        assert!(approx_eq(smoothed[0], 1.5, 1e-12));
        assert!(approx_eq(smoothed[2], 3.0, 1e-12));
        assert!(approx_eq(smoothed[4], 4.5, 1e-12));
    }

    #[test]
    fn test_smooth_even_window_width() {
        let series: Vec<f64> = (1..=8).map(|i| i as f64).collect();
        let smoothed = moving_average_smooth(&series, 4);

        // Index 3 averages indices 2..=5, exactly four points
        assert!(approx_eq(smoothed[3], 4.5, 1e-12));
        // Index 0 averages indices 0..=2
        assert!(approx_eq(smoothed[0], 2.0, 1e-12));
    }

    #[test]
    fn test_ema_carries_forward() {
        let values = [None, Some(80.0), None, Some(84.0), None];
        let ema = exponential_moving_average(&values, 0.25);

        assert_eq!(ema[0], None);
        assert_eq!(ema[1], Some(80.0));
        assert_eq!(ema[2], Some(80.0));
        assert!(approx_eq(ema[3].unwrap(), 81.0, 1e-12));
        assert!(approx_eq(ema[4].unwrap(), 81.0, 1e-12));
    }

    #[test]
    fn test_ema_constant_series() {
        let values = vec![Some(65.0); 12];
        for value in exponential_moving_average(&values, 0.25) {
            assert!(approx_eq(value.unwrap(), 65.0, 1e-12));
        }
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2.34567, 2), 2.35);
        assert_eq!(round_to(-0.09714, 3), -0.097);
        assert_eq!(round_to(2579.6, 0), 2580.0);
    }
}
