//! Element-wise helpers shared by indicators and strategies.
//!
//! Comparisons involving `NaN` are `false`, so undefined history never
//! raises a flag.

/// Values shifted forward by `n` bars; the first `n` entries are `NaN`.
pub fn shift(values: &[f64], n: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i >= n { values[i - n] } else { f64::NAN })
        .collect()
}

pub fn gt(a: &[f64], b: &[f64]) -> Vec<bool> {
    a.iter().zip(b).map(|(x, y)| x > y).collect()
}

pub fn lt(a: &[f64], b: &[f64]) -> Vec<bool> {
    a.iter().zip(b).map(|(x, y)| x < y).collect()
}

pub fn gt_scalar(a: &[f64], threshold: f64) -> Vec<bool> {
    a.iter().map(|x| *x > threshold).collect()
}

pub fn lt_scalar(a: &[f64], threshold: f64) -> Vec<bool> {
    a.iter().map(|x| *x < threshold).collect()
}

pub fn and(a: &[bool], b: &[bool]) -> Vec<bool> {
    a.iter().zip(b).map(|(x, y)| *x && *y).collect()
}

pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

pub fn div(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x / y).collect()
}

/// `a` is above `b` on this bar and was at or below it on the previous one.
pub fn crossed_above(a: &[f64], b: &[f64]) -> Vec<bool> {
    (0..a.len())
        .map(|i| i > 0 && a[i] > b[i] && a[i - 1] <= b[i - 1])
        .collect()
}

/// `a` is below `b` on this bar and was at or above it on the previous one.
pub fn crossed_below(a: &[f64], b: &[f64]) -> Vec<bool> {
    (0..a.len())
        .map(|i| i > 0 && a[i] < b[i] && a[i - 1] >= b[i - 1])
        .collect()
}

/// Current value compared with the value `n` bars back.
pub fn rising(values: &[f64], n: usize) -> Vec<bool> {
    gt(values, &shift(values, n))
}

pub fn falling(values: &[f64], n: usize) -> Vec<bool> {
    lt(values, &shift(values, n))
}

/// `(x[i] - x[i-n]) / x[i-n]`.
pub fn rate_of_change(values: &[f64], n: usize) -> Vec<f64> {
    let prev = shift(values, n);
    values.iter().zip(&prev).map(|(x, p)| (x - p) / p).collect()
}

fn full_window(values: &[f64], end: usize, window: usize) -> Option<&[f64]> {
    if window == 0 || end + 1 < window {
        return None;
    }
    let slice = &values[end + 1 - window..=end];
    if slice.iter().any(|v| v.is_nan()) {
        None
    } else {
        Some(slice)
    }
}

/// Trailing mean; `NaN` until `window` defined values are available.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| match full_window(values, i, window) {
            Some(w) => w.iter().sum::<f64>() / window as f64,
            None => f64::NAN,
        })
        .collect()
}

/// Trailing sample standard deviation (n − 1 denominator).
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| match full_window(values, i, window) {
            Some(w) if window > 1 => {
                let mean = w.iter().sum::<f64>() / window as f64;
                let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - 1) as f64;
                var.sqrt()
            }
            _ => f64::NAN,
        })
        .collect()
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| match full_window(values, i, window) {
            Some(w) => w.iter().copied().fold(f64::INFINITY, f64::min),
            None => f64::NAN,
        })
        .collect()
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| match full_window(values, i, window) {
            Some(w) => w.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            None => f64::NAN,
        })
        .collect()
}

/// Trailing quantile with linear interpolation between order statistics.
pub fn rolling_quantile(values: &[f64], window: usize, q: f64) -> Vec<f64> {
    (0..values.len())
        .map(|i| match full_window(values, i, window) {
            Some(w) => {
                let mut sorted = w.to_vec();
                sorted.sort_by(f64::total_cmp);
                let pos = q.clamp(0.0, 1.0) * (window - 1) as f64;
                let lo = pos.floor() as usize;
                let hi = pos.ceil() as usize;
                sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
            }
            None => f64::NAN,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_pads_with_nan() {
        let out = shift(&[1.0, 2.0, 3.0], 1);
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &[1.0, 2.0]);
    }

    #[test]
    fn crossover_needs_previous_bar_at_or_below() {
        let fast = [1.0, 2.0, 3.0, 2.0];
        let slow = [2.0, 2.0, 2.0, 2.5];
        assert_eq!(crossed_above(&fast, &slow), vec![false, false, true, false]);
        assert_eq!(crossed_below(&fast, &slow), vec![false, false, false, true]);
    }

    #[test]
    fn nan_comparisons_are_false() {
        assert_eq!(gt(&[f64::NAN], &[0.0]), vec![false]);
        assert_eq!(lt(&[f64::NAN], &[0.0]), vec![false]);
    }

    #[test]
    fn rolling_std_is_sample_std() {
        let out = rolling_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        assert!((out[7] - 2.138_089_935_299_395).abs() < 1e-12);
    }

    #[test]
    fn rolling_window_with_nan_is_undefined() {
        let out = rolling_mean(&[1.0, f64::NAN, 3.0, 5.0], 2);
        assert!(out[1].is_nan());
        assert!(out[2].is_nan());
        assert_eq!(out[3], 4.0);
    }

    #[test]
    fn rolling_quantile_interpolates() {
        let out = rolling_quantile(&[4.0, 1.0, 3.0, 2.0, 5.0], 5, 0.2);
        // sorted 1 2 3 4 5, position 0.8
        assert!((out[4] - 1.8).abs() < 1e-12);
        assert!(out[3].is_nan());
    }

    #[test]
    fn min_max_over_window() {
        let v = [3.0, 1.0, 4.0, 1.5, 5.0];
        assert_eq!(rolling_min(&v, 3)[4], 1.5);
        assert_eq!(rolling_max(&v, 3)[3], 4.0);
    }
}
