use super::ops::rolling_mean;

/// Simple moving average over the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    rolling_mean(values, period)
}

/// Exponential moving average with span `period` (alpha = 2 / (period + 1)).
///
/// Weights are bias-adjusted: each output is the exponentially weighted mean
/// of every observation seen so far, so the average is defined from the very
/// first bar and never looks ahead. An undefined input ages the existing
/// weights without contributing to them.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    values
        .iter()
        .map(|&v| {
            weighted_sum *= decay;
            weight_total *= decay;
            if !v.is_nan() {
                weighted_sum += v;
                weight_total += 1.0;
            }
            if weight_total > 0.0 {
                weighted_sum / weight_total
            } else {
                f64::NAN
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_trails_by_period() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 2.0);
        assert_eq!(out[3], 3.0);
    }

    #[test]
    fn ema_first_value_is_first_input() {
        let out = ema(&[10.0, 20.0], 3);
        assert_eq!(out[0], 10.0);
        // weights 1 and 0.5 -> (20 + 0.5 * 10) / 1.5
        assert!((out[1] - 25.0 / 1.5).abs() < 1e-12);
    }

    #[test]
    fn ema_of_constant_series_is_that_constant() {
        let out = ema(&vec![42.5; 200], 12);
        assert!(out.iter().all(|v| (v - 42.5).abs() < 1e-9));
    }

    #[test]
    fn ema_converges_after_level_shift() {
        let mut values = vec![10.0; 20];
        values.extend(vec![50.0; 300]);
        let out = ema(&values, 10);
        assert!((out.last().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn ema_does_not_look_ahead() {
        let short = ema(&[1.0, 5.0, 2.0], 5);
        let long = ema(&[1.0, 5.0, 2.0, 100.0, -3.0], 5);
        assert_eq!(short[..], long[..3]);
    }

    #[test]
    fn ema_skips_leading_nan() {
        let out = ema(&[f64::NAN, 4.0], 3);
        assert!(out[0].is_nan());
        assert_eq!(out[1], 4.0);
    }
}
