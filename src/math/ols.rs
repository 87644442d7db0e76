//! Least squares solvers.
//!
//! Every fit in this crate reduces to small problems of the form:
//!
//! ```text
//! minimize Σ w_i (y_i - x_i^T β)^2
//! ```
//!
//! - Weights are applied by scaling rows by `sqrt(w_i)`.
//! - Ridge-style priors are appended as extra rows (see `structural`), so the
//!   same solver covers penalized fits.
//! - SVD handles tall design matrices and near-collinear columns (nalgebra's
//!   `QR::solve` is intended for square systems).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Weighted simple regression `y = a + b x`, returning `(a, b)`.
///
/// `x` is centred before solving so that calendar years (~2000) do not wreck
/// the conditioning; the intercept is mapped back afterwards.
pub fn weighted_line_fit(x: &[f64], y: &[f64], w: &[f64]) -> Option<(f64, f64)> {
    let n = x.len();
    if n == 0 || y.len() != n || w.len() != n {
        return None;
    }
    let x_mean = x.iter().sum::<f64>() / n as f64;

    let mut xw = DMatrix::<f64>::zeros(n, 2);
    let mut yw = DVector::<f64>::zeros(n);
    for i in 0..n {
        if !(w[i].is_finite() && w[i] >= 0.0) {
            return None;
        }
        let sw = w[i].sqrt();
        xw[(i, 0)] = sw;
        xw[(i, 1)] = (x[i] - x_mean) * sw;
        yw[i] = y[i] * sw;
    }

    let beta = solve_least_squares(&xw, &yw)?;
    let slope = beta[1];
    let intercept = beta[0] - slope * x_mean;
    if intercept.is_finite() && slope.is_finite() {
        Some((intercept, slope))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn line_fit_recovers_calendar_year_trend() {
        let x: Vec<f64> = (2010..2024).map(|y| y as f64).collect();
        let y: Vec<f64> = x.iter().map(|&yr| 20.0 + 0.1 * (yr - 2010.0)).collect();
        let w = vec![1.0; x.len()];

        let (a, b) = weighted_line_fit(&x, &y, &w).unwrap();
        assert!((b - 0.1).abs() < 1e-9);
        assert!((a + b * 2026.0 - 21.6).abs() < 1e-8);
    }

    #[test]
    fn line_fit_single_point_is_flat() {
        let (a, b) = weighted_line_fit(&[2020.0], &[25.0], &[1.0]).unwrap();
        assert!(b.abs() < 1e-12);
        assert!((a - 25.0).abs() < 1e-9);
    }
}
