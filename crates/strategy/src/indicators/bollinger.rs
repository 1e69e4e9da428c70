use super::moving_average::sma;
use super::ops::rolling_std;

/// Bollinger Bands: SMA middle band with `k` sample standard deviations either side.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub period: usize,
    pub k: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    pub fn new(period: usize, k: f64) -> Self {
        Self { period, k }
    }

    pub fn compute(&self, closes: &[f64]) -> Bands {
        let middle = sma(closes, self.period);
        let std = rolling_std(closes, self.period);
        let upper = middle.iter().zip(&std).map(|(m, s)| m + self.k * s).collect();
        let lower = middle.iter().zip(&std).map(|(m, s)| m - self.k * s).collect();
        Bands { upper, middle, lower }
    }
}

impl Bands {
    /// Position of `close` inside the bands: 0 at the lower band, 1 at the upper.
    pub fn percent_b(&self, closes: &[f64]) -> Vec<f64> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| (c - self.lower[i]) / (self.upper[i] - self.lower[i]))
            .collect()
    }

    /// Band width relative to the middle band.
    pub fn width(&self) -> Vec<f64> {
        (0..self.middle.len())
            .map(|i| (self.upper[i] - self.lower[i]) / self.middle[i])
            .collect()
    }
}
