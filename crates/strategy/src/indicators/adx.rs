use super::atr::true_range;

/// Average Directional Index with the +DI / −DI lines, Wilder smoothing.
///
/// +DM, −DM and the true range are summed over the first `period − 1`
/// changes and then smoothed as `s = s − s / period + x`. The DI lines are
/// defined from index `period`; ADX is the mean of the first `period` DX
/// values (index `2·period − 1`) and Wilder-averaged after that.
///
/// Too little history or non-finite inputs yield all-`NaN` output rather
/// than an error: callers treat it as "no trend information".
#[derive(Debug, Clone)]
pub struct AdxIndicator {
    pub period: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionalIndex {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

impl DirectionalIndex {
    fn unavailable(len: usize) -> Self {
        Self {
            adx: vec![f64::NAN; len],
            plus_di: vec![f64::NAN; len],
            minus_di: vec![f64::NAN; len],
        }
    }

    pub fn is_available(&self) -> bool {
        self.adx.iter().any(|v| !v.is_nan())
    }
}

impl AdxIndicator {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn compute(&self, high: &[f64], low: &[f64], close: &[f64]) -> DirectionalIndex {
        let n = close.len();
        let period = self.period;
        let finite = |s: &[f64]| s.iter().all(|v| v.is_finite());
        if period < 2
            || n < 2 * period
            || high.len() != n
            || low.len() != n
            || !(finite(high) && finite(low) && finite(close))
        {
            return DirectionalIndex::unavailable(n);
        }

        let p = period as f64;
        let tr = true_range(high, low, close);
        let mut out = DirectionalIndex::unavailable(n);

        let mut plus_dm_s = 0.0;
        let mut minus_dm_s = 0.0;
        let mut tr_s = 0.0;
        for i in 1..period {
            let (plus, minus) = directional_movement(high, low, i);
            plus_dm_s += plus;
            minus_dm_s += minus;
            tr_s += tr[i];
        }

        let mut dx_sum = 0.0;
        let mut adx = f64::NAN;
        for i in period..n {
            let (plus, minus) = directional_movement(high, low, i);
            plus_dm_s = plus_dm_s - plus_dm_s / p + plus;
            minus_dm_s = minus_dm_s - minus_dm_s / p + minus;
            tr_s = tr_s - tr_s / p + tr[i];

            let (plus_di, minus_di) = if tr_s != 0.0 {
                (100.0 * plus_dm_s / tr_s, 100.0 * minus_dm_s / tr_s)
            } else {
                (0.0, 0.0)
            };
            out.plus_di[i] = plus_di;
            out.minus_di[i] = minus_di;

            let di_sum = plus_di + minus_di;
            let dx = if di_sum != 0.0 {
                100.0 * (plus_di - minus_di).abs() / di_sum
            } else {
                0.0
            };

            if i < 2 * period - 1 {
                dx_sum += dx;
            } else if i == 2 * period - 1 {
                dx_sum += dx;
                adx = dx_sum / p;
                out.adx[i] = adx;
            } else {
                adx = (adx * (p - 1.0) + dx) / p;
                out.adx[i] = adx;
            }
        }

        out
    }
}

fn directional_movement(high: &[f64], low: &[f64], i: usize) -> (f64, f64) {
    let up = high[i] - high[i - 1];
    let down = low[i - 1] - low[i];
    let plus = if up > down && up > 0.0 { up } else { 0.0 };
    let minus = if down > up && down > 0.0 { down } else { 0.0 };
    (plus, minus)
}
