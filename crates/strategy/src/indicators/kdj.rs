use super::ops::{rolling_max, rolling_min};

/// Seed value for both K and D before the first defined RSV.
pub const KDJ_SEED: f64 = 50.0;

/// Stochastic KDJ oscillator.
///
/// `RSV = (close − lowest low) / (highest high − lowest low) · 100` over
/// `period` bars, then `K = ((k_smooth − 1)·K_prev + RSV) / k_smooth`,
/// `D = ((d_smooth − 1)·D_prev + K) / d_smooth`, `J = 3K − 2D`.
///
/// K and D are a recursive filter: both start at [`KDJ_SEED`] and the
/// result depends on every earlier bar, so the input must be in timestamp
/// order. Where RSV is undefined (warm-up, a gap in the window, or a zero
/// range) K keeps its previous value.
#[derive(Debug, Clone)]
pub struct KdjIndicator {
    pub period: usize,
    pub k_smooth: usize,
    pub d_smooth: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Kdj {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
}

impl KdjIndicator {
    pub fn new(period: usize, k_smooth: usize, d_smooth: usize) -> Self {
        Self {
            period,
            k_smooth,
            d_smooth,
        }
    }

    pub fn compute(&self, high: &[f64], low: &[f64], close: &[f64]) -> Kdj {
        let lowest = rolling_min(low, self.period);
        let highest = rolling_max(high, self.period);
        let k_weight = self.k_smooth.max(1) as f64;
        let d_weight = self.d_smooth.max(1) as f64;

        let n = close.len();
        let mut out = Kdj {
            k: Vec::with_capacity(n),
            d: Vec::with_capacity(n),
            j: Vec::with_capacity(n),
        };

        let mut k_prev = KDJ_SEED;
        let mut d_prev = KDJ_SEED;
        for i in 0..n {
            let range = highest[i] - lowest[i];
            let rsv = (close[i] - lowest[i]) / range * 100.0;
            let k = if range > 0.0 && rsv.is_finite() {
                ((k_weight - 1.0) * k_prev + rsv) / k_weight
            } else {
                k_prev
            };
            let d = ((d_weight - 1.0) * d_prev + k) / d_weight;

            out.k.push(k);
            out.d.push(d);
            out.j.push(3.0 * k - 2.0 * d);
            k_prev = k;
            d_prev = d;
        }

        out
    }
}

impl Default for KdjIndicator {
    fn default() -> Self {
        Self::new(9, 3, 3)
    }
}
