//! Numeric kernels shared by the cleaner and the analyzer, on top of
//! `statrs`.
//!
//! All functions take already-filtered values (no missing markers) unless
//! noted, and return `NaN` where the statistic is undefined.

use statrs::statistics::{Data, OrderStatistics, Statistics};

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    Statistics::mean(values)
}

/// Sample standard deviation (divides by n − 1); `NaN` below two values.
pub fn sample_std(values: &[f64]) -> f64 {
    Statistics::std_dev(values)
}

pub fn min(values: &[f64]) -> f64 {
    Statistics::min(values)
}

pub fn max(values: &[f64]) -> f64 {
    Statistics::max(values)
}

/// Quantile with linear interpolation between closest ranks.
///
/// For values `x` of length `n`, the position is `p · (n − 1)`; the result
/// interpolates between the two neighbouring order statistics.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut data = Data::new(values.to_vec());
    let pos = p.clamp(0.0, 1.0) * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    // order statistics are 1-based
    let a = data.order_statistic(lo + 1);
    let b = data.order_statistic(hi + 1);
    a + (b - a) * (pos - lo as f64)
}

/// Pearson correlation over the rows where both cells are present.
///
/// `NaN` when fewer than two complete pairs remain or either side has zero
/// variance. The result is clamped to `[-1, 1]` against rounding drift.
pub fn pearson_pairwise(a: &[Option<f64>], b: &[Option<f64>]) -> f64 {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    if xs.len() < 2 {
        return f64::NAN;
    }

    let sx = sample_std(&xs);
    let sy = sample_std(&ys);
    if sx == 0.0 || sy == 0.0 {
        return f64::NAN;
    }
    (Statistics::covariance(&xs, &ys) / (sx * sy)).clamp(-1.0, 1.0)
}
