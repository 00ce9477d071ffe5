//! Real polynomials in `s`, stored as coefficient vectors in descending powers.
//!
//! `[a0, a1, a2]` means `a0*s^2 + a1*s + a2`, matching the usual
//! numerator/denominator notation for transfer functions.

use nalgebra::{Complex, DMatrix};

use crate::error::AppError;

/// Drop leading (highest-power) zero coefficients.
///
/// An all-zero or empty polynomial becomes `[0.0]`.
pub fn trim(coeffs: &[f64]) -> Vec<f64> {
    match coeffs.iter().position(|&c| c != 0.0) {
        Some(first) => coeffs[first..].to_vec(),
        None => vec![0.0],
    }
}

/// Degree of the polynomial after trimming.
pub fn degree(coeffs: &[f64]) -> usize {
    trim(coeffs).len() - 1
}

/// Evaluate at a complex point (Horner).
pub fn eval(coeffs: &[f64], s: Complex<f64>) -> Complex<f64> {
    coeffs
        .iter()
        .fold(Complex::new(0.0, 0.0), |acc, &c| acc * s + c)
}

/// Sum of two polynomials (aligned on the constant term).
pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len().max(b.len());
    let mut out = vec![0.0; n];
    for (i, &c) in a.iter().rev().enumerate() {
        out[n - 1 - i] += c;
    }
    for (i, &c) in b.iter().rev().enumerate() {
        out[n - 1 - i] += c;
    }
    out
}

/// Product of two polynomials.
pub fn mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return vec![0.0];
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// All complex roots, sorted by real part then imaginary part.
///
/// Computed as the eigenvalues of the companion matrix. A constant polynomial
/// has no roots.
pub fn roots(coeffs: &[f64]) -> Result<Vec<Complex<f64>>, AppError> {
    if coeffs.iter().any(|c| !c.is_finite()) {
        return Err(AppError::numeric("Polynomial has non-finite coefficients."));
    }
    let p = trim(coeffs);
    let n = p.len() - 1;
    if n == 0 {
        return Ok(Vec::new());
    }

    let lead = p[0];
    let mut out = if n == 1 {
        vec![Complex::new(-p[1] / lead, 0.0)]
    } else {
        let mut companion = DMatrix::<f64>::zeros(n, n);
        for j in 0..n {
            companion[(0, j)] = -p[j + 1] / lead;
        }
        for i in 1..n {
            companion[(i, i - 1)] = 1.0;
        }
        companion.complex_eigenvalues().iter().copied().collect::<Vec<_>>()
    };

    if out.iter().any(|z| !(z.re.is_finite() && z.im.is_finite())) {
        return Err(AppError::numeric("Root finding produced non-finite values."));
    }

    out.sort_by(compare_roots);
    Ok(out)
}

// Conjugate pairs come back with slightly different real parts, so real parts
// within a relative 1e-9 count as equal and the imaginary part decides.
fn compare_roots(a: &Complex<f64>, b: &Complex<f64>) -> std::cmp::Ordering {
    let scale = 1.0 + a.norm().max(b.norm());
    if (a.re - b.re).abs() <= 1e-9 * scale {
        a.im.partial_cmp(&b.im).unwrap_or(std::cmp::Ordering::Equal)
    } else {
        a.re.partial_cmp(&b.re).unwrap_or(std::cmp::Ordering::Equal)
    }
}
