//! Outlier-resistant estimators.
//!
//! - `theil_sen`: median of pairwise slopes (breakdown point ~29%)
//! - `huber_reweight`: one IRLS step of the Huber M-estimator
//! - `median` / `quantile`: order statistics shared with data cleaning

use rayon::prelude::*;

/// Consistency constant that turns a MAD into a normal-scale estimate.
const MAD_TO_SIGMA: f64 = 0.6745;

/// Median of a slice (average of the two middle values for even lengths).
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted = values.to_vec();
    median_mut(&mut sorted)
}

fn median_mut(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Linear-interpolated quantile of an ascending-sorted slice, `q` in `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !q.is_finite() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Theil–Sen line fit: returns `(intercept, slope)`.
///
/// Slope is the median over all pairs with distinct `x`; the intercept is the
/// median of `y_i - slope * x_i`. A single point (or all-equal `x`) gives a
/// flat line through the median of `y`.
pub fn theil_sen(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();
    if n == 0 || y.len() != n {
        return None;
    }

    let slopes: Vec<f64> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            ((i + 1)..n).filter_map(move |j| {
                let dx = x[j] - x[i];
                if dx == 0.0 {
                    return None;
                }
                let s = (y[j] - y[i]) / dx;
                s.is_finite().then_some(s)
            })
        })
        .collect();

    let slope = median(&slopes).unwrap_or(0.0);
    let offsets: Vec<f64> = x.iter().zip(y).map(|(&xi, &yi)| yi - slope * xi).collect();
    let intercept = median(&offsets)?;

    if intercept.is_finite() && slope.is_finite() {
        Some((intercept, slope))
    } else {
        None
    }
}

/// One Huber reweighting step.
///
/// Residual scale comes from the MAD; observations beyond `k * scale` are
/// downweighted by `cutoff / |r|`, floored at `1e-3` of their base weight.
pub fn huber_reweight(w_base: &[f64], residuals: &[f64], k: f64) -> Vec<f64> {
    let mut abs: Vec<f64> = residuals.iter().map(|r| r.abs()).filter(|v| v.is_finite()).collect();
    let mad = median_mut(&mut abs).unwrap_or(0.0);
    let scale = (mad / MAD_TO_SIGMA).max(1e-12);
    let cutoff = (k.max(1e-6)) * scale;

    let min_factor = 1e-3;
    w_base
        .iter()
        .zip(residuals.iter())
        .map(|(&w0, &r)| {
            let ar = r.abs();
            let factor = if ar <= cutoff || !ar.is_finite() { 1.0 } else { cutoff / ar };
            (w0 * factor).max(w0 * min_factor)
        })
        .collect()
}
