//! Basis functions for the piecewise-linear trend.
//!
//! The trend with changepoints `s_j` and rate adjustments `δ_j` is
//!
//! `g(t) = m + k t + Σ_j δ_j (t - s_j)_+`
//!
//! which is continuous at every changepoint. The design row for one
//! observation is therefore `[1, t, (t - s_1)_+, ..., (t - s_J)_+]`.

/// Hinge function `(t - s)_+`.
pub fn hinge(t: f64, s: f64) -> f64 {
    if t > s { t - s } else { 0.0 }
}

/// Fill a design row for the trend: intercept, slope, then one hinge per changepoint.
///
/// # Panics
/// Panics if `out.len() != 2 + changepoints.len()`.
pub fn fill_trend_row(t: f64, changepoints: &[f64], out: &mut [f64]) {
    assert_eq!(out.len(), 2 + changepoints.len(), "design row length mismatch");
    out[0] = 1.0;
    out[1] = t;
    for (j, &s) in changepoints.iter().enumerate() {
        out[2 + j] = hinge(t, s);
    }
}

/// Evaluate the trend at `t`.
pub fn eval_trend(t: f64, m: f64, k: f64, changepoints: &[f64], deltas: &[f64]) -> f64 {
    let bends: f64 = changepoints
        .iter()
        .zip(deltas)
        .map(|(&s, &d)| d * hinge(t, s))
        .sum();
    m + k * t + bends
}
