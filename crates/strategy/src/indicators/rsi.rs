use super::ops::rolling_mean;

/// RSI (Relative Strength Index) indicator.
///
/// Average gain and average loss are plain rolling means of the bar-to-bar
/// close changes over `period` bars. The first bar has no predecessor and
/// counts as a zero change, so the first value appears at index `period - 1`.
///
/// When the average loss is zero the ratio is undefined; the value is 100
/// if there were any gains and 50 for a completely flat window.
#[derive(Debug, Clone)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Compute RSI for every bar of a close series (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Vec<f64> {
        let mut gains = Vec::with_capacity(closes.len());
        let mut losses = Vec::with_capacity(closes.len());
        for i in 0..closes.len() {
            let change = if i == 0 { f64::NAN } else { closes[i] - closes[i - 1] };
            // An undefined change is neither a gain nor a loss.
            gains.push(if change > 0.0 { change } else { 0.0 });
            losses.push(if change < 0.0 { -change } else { 0.0 });
        }

        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);

        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&gain, &loss)| {
                if gain.is_nan() || loss.is_nan() {
                    f64::NAN
                } else if loss == 0.0 {
                    if gain > 0.0 {
                        100.0
                    } else {
                        50.0
                    }
                } else {
                    let rs = gain / loss;
                    100.0 - 100.0 / (1.0 + rs)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_is_undefined_before_period() {
        let rsi = RsiIndicator::new(14);
        let prices: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        let out = rsi.compute(&prices);
        assert!(out[12].is_nan());
        assert!(!out[13].is_nan());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let rsi = RsiIndicator::new(3);
        // Strictly increasing prices: zero average loss
        let out = rsi.compute(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_eq!(out[4], 100.0);
        assert!(out[2..].iter().all(|v| v.is_finite()));
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let rsi = RsiIndicator::new(3);
        let out = rsi.compute(&[14.0, 13.0, 12.0, 11.0, 10.0]);
        assert!((out[4] - 0.0).abs() < 1e-9, "Expected ~0, got {}", out[4]);
    }

    #[test]
    fn rsi_flat_series_is_neutral() {
        let rsi = RsiIndicator::new(5);
        let out = rsi.compute(&[7.0; 10]);
        assert_eq!(out[9], 50.0);
    }

    #[test]
    fn rsi_known_value() {
        // gains 2 and 1 against a loss of 1 over the window: RS = 3
        let rsi = RsiIndicator::new(3);
        let out = rsi.compute(&[10.0, 12.0, 11.0, 12.0]);
        assert!((out[3] - 75.0).abs() < 1e-9, "got {}", out[3]);
    }

    #[test]
    fn rsi_stays_in_range() {
        let rsi = RsiIndicator::new(14);
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09,
        ];
        let out = rsi.compute(&prices);
        let v = *out.last().unwrap();
        assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
    }
}
