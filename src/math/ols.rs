//! Least squares solvers.
//!
//! Two users in this crate:
//! - the VCO characteristic, a straight line `f = f0 + slope * V`
//! - the Levenberg-Marquardt steps of the resistor design, which are small
//!   augmented systems `[J; sqrt(lambda) D] * delta = [-r; 0]`
//!
//! Both are tall systems, so we solve them through SVD (nalgebra's `QR::solve`
//! only handles square matrices).

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Straight-line fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Root mean square residual, in units of `y`.
    pub rms: f64,
    pub n: usize,
}

/// Ordinary least squares line through `(x, y)` pairs.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<LinearFit, AppError> {
    if x.len() != y.len() {
        return Err(AppError::input("Line fit needs equally long x and y."));
    }
    let n = x.len();
    if n < 2 {
        return Err(AppError::data(format!("Line fit needs at least 2 points, got {n}.")));
    }
    let x_first = x[0];
    if x.iter().all(|&v| v == x_first) {
        return Err(AppError::data("Line fit needs at least 2 distinct x values."));
    }

    let mut design = DMatrix::<f64>::zeros(n, 2);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = xi;
    }
    let rhs = DVector::from_row_slice(y);
    let beta = solve_least_squares(&design, &rhs)
        .ok_or_else(|| AppError::numeric("Line fit is ill-conditioned."))?;

    let (intercept, slope) = (beta[0], beta[1]);
    let mean = y.iter().sum::<f64>() / n as f64;
    let mut sse = 0.0;
    let mut sst = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let r = yi - (intercept + slope * xi);
        sse += r * r;
        sst += (yi - mean) * (yi - mean);
    }
    let r_squared = if sst > 0.0 { 1.0 - sse / sst } else { 1.0 };

    Ok(LinearFit {
        intercept,
        slope,
        r_squared,
        rms: (sse / n as f64).sqrt(),
        n,
    })
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
    fn linear_fit_reports_quality() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.1, 4.9, 7.0];
        let fit = linear_fit(&x, &y).unwrap();
        assert!((fit.slope - 1.98).abs() < 1e-9);
        assert!(fit.r_squared > 0.99 && fit.r_squared <= 1.0);
        assert!(fit.rms > 0.0 && fit.rms < 0.1);
        assert_eq!(fit.n, 4);
    }

    #[test]
    fn linear_fit_rejects_degenerate_input() {
        assert_eq!(linear_fit(&[1.0], &[2.0]).unwrap_err().exit_code(), 3);
        assert_eq!(linear_fit(&[1.0, 1.0], &[2.0, 3.0]).unwrap_err().exit_code(), 3);
    }
}
