//! Rational transfer functions `H(s) = num(s) / den(s)`.

use std::f64::consts::PI;

use nalgebra::Complex;

use crate::error::AppError;
use crate::math::poly;

/// A linear time-invariant transfer function with real coefficients.
///
/// Coefficients are stored in descending powers of `s` with leading zeros
/// trimmed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    num: Vec<f64>,
    den: Vec<f64>,
}

impl TransferFunction {
    pub fn new(num: &[f64], den: &[f64]) -> Result<Self, AppError> {
        if num.iter().chain(den).any(|c| !c.is_finite()) {
            return Err(AppError::numeric("Transfer function has non-finite coefficients."));
        }
        let den = poly::trim(den);
        if den == [0.0] {
            return Err(AppError::numeric("Transfer function denominator is zero."));
        }
        Ok(Self {
            num: poly::trim(num),
            den,
        })
    }

    pub fn num(&self) -> &[f64] {
        &self.num
    }

    pub fn den(&self) -> &[f64] {
        &self.den
    }

    /// Order of the system (degree of the denominator).
    pub fn order(&self) -> usize {
        poly::degree(&self.den)
    }

    /// `true` when the numerator degree does not exceed the denominator degree.
    pub fn is_proper(&self) -> bool {
        poly::degree(&self.num) <= poly::degree(&self.den)
    }

    /// Roots of the denominator.
    pub fn poles(&self) -> Result<Vec<Complex<f64>>, AppError> {
        poly::roots(&self.den)
    }

    /// Roots of the numerator.
    pub fn zeros(&self) -> Result<Vec<Complex<f64>>, AppError> {
        poly::roots(&self.num)
    }

    pub fn eval(&self, s: Complex<f64>) -> Complex<f64> {
        poly::eval(&self.num, s) / poly::eval(&self.den, s)
    }

    /// `H(j*2*pi*f)` for a frequency in Hz.
    pub fn frequency_response(&self, hz: f64) -> Complex<f64> {
        self.eval(Complex::new(0.0, 2.0 * PI * hz))
    }

    /// `H(0)`, or `None` for a pole at the origin.
    pub fn dc_gain(&self) -> Option<f64> {
        let d0 = self.den[self.den.len() - 1];
        if d0 == 0.0 {
            None
        } else {
            Some(self.num[self.num.len() - 1] / d0)
        }
    }

    /// Unity negative feedback around `self`: `G / (1 + G)`.
    pub fn closed_loop(&self) -> Result<Self, AppError> {
        Self::new(&self.num, &poly::add(&self.den, &self.num))
    }

    /// Series connection `self * other`.
    pub fn series(&self, other: &Self) -> Result<Self, AppError> {
        Self::new(
            &poly::mul(&self.num, &other.num),
            &poly::mul(&self.den, &other.den),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_loop_of_integrator_is_first_order_lag() {
        // G = 10/s  ->  H = 10/(s + 10)
        let g = TransferFunction::new(&[10.0], &[1.0, 0.0]).unwrap();
        let h = g.closed_loop().unwrap();
        assert_eq!(h.num(), &[10.0]);
        assert_eq!(h.den(), &[1.0, 10.0]);
        assert_eq!(h.dc_gain(), Some(1.0));
        assert_eq!(g.dc_gain(), None);
        let poles = h.poles().unwrap();
        assert!((poles[0].re + 10.0).abs() < 1e-12);
    }

    #[test]
    fn frequency_response_of_first_order_lag_at_corner() {
        let h = TransferFunction::new(&[1.0], &[1.0 / (2.0 * PI), 1.0]).unwrap();
        let v = h.frequency_response(1.0);
        assert!((v.norm() - 1.0 / 2f64.sqrt()).abs() < 1e-12);
        assert!((v.arg().to_degrees() + 45.0).abs() < 1e-9);
    }

    #[test]
    fn leading_zeros_are_trimmed_and_zero_denominator_rejected() {
        let h = TransferFunction::new(&[0.0, 1.0], &[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(h.order(), 1);
        assert!(h.is_proper());
        assert!(TransferFunction::new(&[1.0], &[0.0]).is_err());
    }

    #[test]
    fn zeros_are_numerator_roots() {
        let h = TransferFunction::new(&[2.0, 4.0], &[1.0, 3.0, 2.0]).unwrap();
        let zeros = h.zeros().unwrap();
        assert_eq!(zeros.len(), 1);
        assert!((zeros[0].re + 2.0).abs() < 1e-12);
        assert_eq!(zeros[0].im, 0.0);

        let lag = TransferFunction::new(&[5.0], &[1.0, 5.0]).unwrap();
        assert!(lag.zeros().unwrap().is_empty());
    }

    #[test]
    fn series_multiplies_polynomials() {
        let a = TransferFunction::new(&[1.0], &[1.0, 1.0]).unwrap();
        let b = TransferFunction::new(&[2.0], &[1.0, 2.0]).unwrap();
        let ab = a.series(&b).unwrap();
        assert_eq!(ab.num(), &[2.0]);
        assert_eq!(ab.den(), &[1.0, 3.0, 2.0]);
    }
}
