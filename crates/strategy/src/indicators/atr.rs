use super::ops::rolling_mean;

/// Average True Range: rolling mean of the true range.
#[derive(Debug, Clone)]
pub struct AtrIndicator {
    pub period: usize,
}

impl AtrIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn compute(&self, high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
        rolling_mean(&true_range(high, low, close), self.period)
    }
}

/// `max(high − low, |high − prev_close|, |low − prev_close|)`, ignoring
/// undefined terms. The first bar has no previous close, so it is `high − low`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    (0..close.len())
        .map(|i| {
            let mut terms = vec![high[i] - low[i]];
            if i > 0 {
                terms.push((high[i] - close[i - 1]).abs());
                terms.push((low[i] - close[i - 1]).abs());
            }
            terms
                .into_iter()
                .filter(|t| !t.is_nan())
                .fold(f64::NAN, f64::max)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn true_range_uses_gap_from_previous_close() {
        let high = [10.0, 15.0];
        let low = [9.0, 14.0];
        let close = [9.5, 14.5];
        let tr = true_range(&high, &low, &close);
        assert_eq!(tr, vec![1.0, 5.5]);
    }

    #[test]
    fn atr_averages_true_range() {
        let high = [11.0, 12.0, 13.0, 14.0];
        let low = [10.0, 11.0, 12.0, 13.0];
        let close = [10.5, 11.5, 12.5, 13.5];
        let atr = AtrIndicator::new(2).compute(&high, &low, &close);
        assert!(atr[0].is_nan());
        // first true range is 1.0 (no previous close), the rest 1.5
        assert_eq!(atr[1], 1.25);
        assert_eq!(atr[3], 1.5);
    }
}
