//! Linear model of the 74HC4046 loop.
//!
//! With loop gain `K = k_pd * k_vco / k_n`, `tau1 = R1*C` and `tau2 = R2*C`
//! the open loop is `G(s) = K * F(s) / s` and the closed loop, referred to the
//! divider output, is `H(s) = G / (1 + G)`:
//!
//! | filter           | G(s)                            | closed-loop denominator         |
//! |------------------|---------------------------------|---------------------------------|
//! | passive lag      | `K / (tau1 s^2 + s)`            | `tau1 s^2 + s + K`              |
//! | passive lag-lead | `K (tau2 s + 1) / ((tau1+tau2) s^2 + s)` | `(tau1+tau2) s^2 + (1 + K tau2) s + K` |
//! | active PI        | `K (tau2 s + 1) / (tau1 s^2)`   | `tau1 s^2 + K tau2 s + K`       |
//!
//! Each closed loop is second order, so natural frequency and damping follow
//! from matching the denominator against `s^2 + 2 zeta wn s + wn^2`.

use std::f64::consts::PI;

use nalgebra::Complex;

use crate::domain::{FilterKind, Margins, Parameters, PoleInfo, SParameters, SecondOrder};
use crate::error::AppError;
use crate::fit::grid::log_space;
use crate::models::TransferFunction;

/// Angular-frequency range scanned for the unity-gain crossover [rad/s].
const CROSSOVER_SCAN: (f64, f64, usize) = (1e-3, 1e10, 400);
const BISECTION_ITERS: usize = 80;

/// Resolved loop: topology, loop gain and filter time constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopModel {
    pub kind: FilterKind,
    /// `K` [1/s].
    pub gain: f64,
    /// `R1 * C` [s].
    pub tau1: f64,
    /// `R2 * C` [s]; zero for the plain lag filter.
    pub tau2: f64,
}

/// Corner frequencies of the loop filter alone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCorners {
    /// Filter pole [Hz]; `0.0` for the integrator of the active filter.
    pub pole: f64,
    /// Filter zero [Hz], if the topology has one.
    pub zero: Option<f64>,
}

impl LoopModel {
    /// Validate the parameter file and build the loop from it.
    pub fn from_parameters(params: &Parameters) -> Result<Self, AppError> {
        let kind = params.validate()?;
        Self::new(kind, &params.s_parameters, &params.loop_filter.r, params.loop_filter.c[0])
    }

    /// Build the loop for explicit component values.
    pub fn new(kind: FilterKind, s: &SParameters, r: &[f64], c: f64) -> Result<Self, AppError> {
        if r.len() != kind.resistor_count() {
            return Err(AppError::input(format!(
                "{} filter needs {} resistor(s), got {}.",
                kind.display_name(),
                kind.resistor_count(),
                r.len()
            )));
        }
        Ok(Self {
            kind,
            gain: s.loop_gain(),
            tau1: r[0] * c,
            tau2: r.get(1).map_or(0.0, |r2| r2 * c),
        })
    }

    /// Loop filter transfer function `F(s)`.
    pub fn filter(&self) -> Result<TransferFunction, AppError> {
        match self.kind {
            FilterKind::PassiveLag => TransferFunction::new(&[1.0], &[self.tau1, 1.0]),
            FilterKind::PassiveLagLead => {
                TransferFunction::new(&[self.tau2, 1.0], &[self.tau1 + self.tau2, 1.0])
            }
            FilterKind::ActivePi => TransferFunction::new(&[self.tau2, 1.0], &[self.tau1, 0.0]),
        }
    }

    /// Open loop `G(s) = K * F(s) / s`.
    pub fn open_loop(&self) -> Result<TransferFunction, AppError> {
        let vco = TransferFunction::new(&[self.gain], &[1.0, 0.0])?;
        self.filter()?.series(&vco)
    }

    /// Closed loop `H(s) = G / (1 + G)`.
    pub fn closed_loop(&self) -> Result<TransferFunction, AppError> {
        self.open_loop()?.closed_loop()
    }

    /// Natural frequency and damping from the closed-form expressions.
    pub fn second_order(&self) -> SecondOrder {
        let k = self.gain;
        let (wn, zeta) = match self.kind {
            FilterKind::PassiveLag => {
                let wn = (k / self.tau1).sqrt();
                (wn, 1.0 / (2.0 * (k * self.tau1).sqrt()))
            }
            FilterKind::PassiveLagLead => {
                let sum = self.tau1 + self.tau2;
                let wn = (k / sum).sqrt();
                (wn, (1.0 + k * self.tau2) / (2.0 * (k * sum).sqrt()))
            }
            FilterKind::ActivePi => {
                let wn = (k / self.tau1).sqrt();
                (wn, self.tau2 * wn / 2.0)
            }
        };
        SecondOrder {
            natural_frequency: wn / (2.0 * PI),
            damping_factor: zeta,
        }
    }

    pub fn filter_corners(&self) -> FilterCorners {
        let hz = |tau: f64| 1.0 / (2.0 * PI * tau);
        match self.kind {
            FilterKind::PassiveLag => FilterCorners {
                pole: hz(self.tau1),
                zero: None,
            },
            FilterKind::PassiveLagLead => FilterCorners {
                pole: hz(self.tau1 + self.tau2),
                zero: Some(hz(self.tau2)),
            },
            FilterKind::ActivePi => FilterCorners {
                pole: 0.0,
                zero: Some(hz(self.tau2)),
            },
        }
    }

    /// Unity-gain crossover and phase margin of the open loop.
    ///
    /// Returns `None` when `|G(jw)|` never crosses 1 inside the scan range.
    pub fn margins(&self) -> Result<Option<Margins>, AppError> {
        let g = self.open_loop()?;
        let mag = |w: f64| g.eval(Complex::new(0.0, w)).norm();

        let (w_lo, w_hi, steps) = CROSSOVER_SCAN;
        let grid = log_space(w_lo, w_hi, steps)?;
        let Some(idx) = grid
            .windows(2)
            .position(|pair| mag(pair[0]) >= 1.0 && mag(pair[1]) < 1.0)
        else {
            return Ok(None);
        };

        // Bisect in log-frequency.
        let (mut lo, mut hi) = (grid[idx].ln(), grid[idx + 1].ln());
        for _ in 0..BISECTION_ITERS {
            let mid = 0.5 * (lo + hi);
            if mag(mid.exp()) >= 1.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        let wc = (0.5 * (lo + hi)).exp();

        let mut phase = g.eval(Complex::new(0.0, wc)).arg();
        if phase > 0.0 {
            phase -= 2.0 * PI;
        }

        Ok(Some(Margins {
            crossover_frequency: wc / (2.0 * PI),
            phase_margin: 180.0 + phase.to_degrees(),
        }))
    }
}

/// Closed-loop transfer function of the PLL described by `params`.
pub fn pll_transfer_function(params: &Parameters) -> Result<TransferFunction, AppError> {
    LoopModel::from_parameters(params)?.closed_loop()
}

/// Natural frequency of a pole [Hz].
pub fn natural_frequency(pole: Complex<f64>) -> f64 {
    pole.norm() / (2.0 * PI)
}

/// Damping factor of a pole: `-Re(p) / |p|`.
///
/// A pole at the origin reports `0.0`.
pub fn damping_factor(pole: Complex<f64>) -> f64 {
    let mag = pole.norm();
    if mag == 0.0 { 0.0 } else { -pole.re / mag }
}

/// Poles of `tf` with their natural frequency and damping.
pub fn analyze_poles(tf: &TransferFunction) -> Result<Vec<PoleInfo>, AppError> {
    Ok(tf
        .poles()?
        .into_iter()
        .map(|pole| PoleInfo {
            pole,
            natural_frequency: natural_frequency(pole),
            damping_factor: damping_factor(pole),
        })
        .collect())
}
