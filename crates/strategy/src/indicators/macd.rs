use super::moving_average::ema;

/// MACD (Moving Average Convergence/Divergence) indicator.
///
/// MACD line = EMA(fast) − EMA(slow), signal line = EMA(macd, signal),
/// histogram = macd − signal. All three are defined from the first bar
/// because the EMAs are.
#[derive(Debug, Clone)]
pub struct MacdIndicator {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdIndicator {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self { fast, slow, signal }
    }

    pub fn compute(&self, closes: &[f64]) -> MacdSeries {
        let fast = ema(closes, self.fast);
        let slow = ema(closes, self.slow);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema(&macd, self.signal);
        let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
        MacdSeries {
            macd,
            signal,
            histogram,
        }
    }
}

impl Default for MacdIndicator {
    fn default() -> Self {
        Self::new(12, 26, 9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::ops::{crossed_above, crossed_below};

    fn trending_up(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn macd_aligns_with_input() {
        let out = MacdIndicator::default().compute(&trending_up(60));
        assert_eq!(out.macd.len(), 60);
        assert_eq!(out.signal.len(), 60);
        assert_eq!(out.histogram.len(), 60);
        assert_eq!(out.macd[0], 0.0);
    }

    #[test]
    fn macd_positive_on_steady_uptrend() {
        let out = MacdIndicator::new(3, 6, 3).compute(&trending_up(40));
        assert!(*out.macd.last().unwrap() > 0.0);
    }

    #[test]
    fn macd_detects_bullish_crossover_after_reversal() {
        // down then sharply up: the MACD line must cross its signal upward somewhere
        let mut prices: Vec<f64> = (0..20).map(|i| 100.0 - i as f64 * 0.5).collect();
        prices.extend((0..20).map(|i| 90.0 + i as f64 * 2.0));
        let out = MacdIndicator::new(3, 6, 3).compute(&prices);
        assert!(crossed_above(&out.macd, &out.signal)[20..].iter().any(|c| *c));
    }

    #[test]
    fn macd_detects_bearish_crossover_after_peak() {
        let mut prices: Vec<f64> = (0..20).map(|i| 100.0 + i as f64 * 0.5).collect();
        prices.extend((0..20).map(|i| 110.0 - i as f64 * 2.0));
        let out = MacdIndicator::new(3, 6, 3).compute(&prices);
        assert!(crossed_below(&out.macd, &out.signal)[20..].iter().any(|c| *c));
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let out = MacdIndicator::default().compute(&trending_up(50));
        for i in 0..50 {
            assert_eq!(out.histogram[i], out.macd[i] - out.signal[i]);
        }
    }
}
