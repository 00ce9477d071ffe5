//! Monte Carlo spread of natural frequency and damping under component
//! tolerances.
//!
//! Each resistor and the capacitor are perturbed independently by a normal
//! relative error whose 3-sigma equals the rated tolerance. Draws come from a
//! seeded `StdRng` so runs are reproducible; the loop evaluations run in
//! parallel afterwards.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::domain::{FilterKind, SParameters, ToleranceSpec};
use crate::error::AppError;
use crate::models::LoopModel;

/// Monte Carlo settings.
#[derive(Debug, Clone)]
pub struct ToleranceOptions {
    pub samples: usize,
    pub seed: u64,
    pub tolerance: ToleranceSpec,
}

/// Summary statistics of one sampled quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spread {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p05: f64,
    pub p95: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct ToleranceReport {
    pub samples: usize,
    pub tolerance: ToleranceSpec,
    /// [Hz]
    pub natural_frequency: Spread,
    pub damping_factor: Spread,
}

/// Run the Monte Carlo analysis for nominal components `r` and `c`.
pub fn monte_carlo(
    kind: FilterKind,
    s: &SParameters,
    r: &[f64],
    c: f64,
    opts: &ToleranceOptions,
) -> Result<ToleranceReport, AppError> {
    if opts.samples < 2 {
        return Err(AppError::input("Tolerance analysis needs at least 2 samples."));
    }
    let tol = opts.tolerance;
    for (name, value) in [("R", tol.r), ("C", tol.c)] {
        if !(value.is_finite() && (0.0..1.0).contains(&value)) {
            return Err(AppError::input(format!(
                "{name} tolerance must be in [0, 1), got {value}."
            )));
        }
    }
    // Validate the nominal loop once so per-sample failures cannot be input errors.
    LoopModel::new(kind, s, r, c)?;

    let r_noise = normal(tol.r)?;
    let c_noise = normal(tol.c)?;
    let mut rng = StdRng::seed_from_u64(opts.seed);

    let draws: Vec<(Vec<f64>, f64)> = (0..opts.samples)
        .map(|_| {
            let rs = r.iter().map(|&v| perturb(v, r_noise.sample(&mut rng))).collect();
            (rs, perturb(c, c_noise.sample(&mut rng)))
        })
        .collect();

    let results: Vec<(f64, f64)> = draws
        .par_iter()
        .map(|(rs, cs)| {
            LoopModel::new(kind, s, rs, *cs).map(|m| {
                let so = m.second_order();
                (so.natural_frequency, so.damping_factor)
            })
        })
        .collect::<Result<_, _>>()?;

    let fns: Vec<f64> = results.iter().map(|r| r.0).collect();
    let zetas: Vec<f64> = results.iter().map(|r| r.1).collect();

    Ok(ToleranceReport {
        samples: opts.samples,
        tolerance: tol,
        natural_frequency: summarize(fns)?,
        damping_factor: summarize(zetas)?,
    })
}

fn normal(tolerance: f64) -> Result<Normal<f64>, AppError> {
    Normal::new(0.0, tolerance / 3.0)
        .map_err(|e| AppError::numeric(format!("Tolerance distribution error: {e}")))
}

fn perturb(nominal: f64, rel: f64) -> f64 {
    // Keep components positive even for extreme draws.
    nominal * (1.0 + rel).max(1e-3)
}

/// Mean, standard deviation, extremes and nearest-rank 5/95 percentiles.
pub fn summarize(mut values: Vec<f64>) -> Result<Spread, AppError> {
    if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numeric("Cannot summarize empty or non-finite samples."));
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = if n > 1 {
        values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n as f64 - 1.0)
    } else {
        0.0
    };
    let rank = |q: f64| values[((q * n as f64).ceil() as usize).clamp(1, n) - 1];

    Ok(Spread {
        mean,
        std: var.sqrt(),
        min: values[0],
        p05: rank(0.05),
        p95: rank(0.95),
        max: values[n - 1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s_params() -> SParameters {
        SParameters {
            k_vco: 2.0e5,
            k_pd: 0.4,
            k_n: 1.0,
        }
    }

    fn opts(r: f64, c: f64) -> ToleranceOptions {
        ToleranceOptions {
            samples: 500,
            seed: 7,
            tolerance: ToleranceSpec { r, c },
        }
    }

    #[test]
    fn zero_tolerance_collapses_to_nominal() {
        let r = [8e5, 4.7e3];
        let nominal = LoopModel::new(FilterKind::PassiveLagLead, &s_params(), &r, 1e-6)
            .unwrap()
            .second_order();
        let rep = monte_carlo(FilterKind::PassiveLagLead, &s_params(), &r, 1e-6, &opts(0.0, 0.0)).unwrap();
        assert!((rep.natural_frequency.mean - nominal.natural_frequency).abs() < 1e-9);
        assert!(rep.natural_frequency.std < 1e-9);
        assert!(rep.damping_factor.std < 1e-12);
    }

    #[test]
    fn spread_brackets_nominal_and_is_reproducible() {
        let r = [8e5, 4.7e3];
        let a = monte_carlo(FilterKind::PassiveLagLead, &s_params(), &r, 1e-6, &opts(0.01, 0.05)).unwrap();
        let b = monte_carlo(FilterKind::PassiveLagLead, &s_params(), &r, 1e-6, &opts(0.01, 0.05)).unwrap();
        assert_eq!(a.natural_frequency, b.natural_frequency);

        let d = a.natural_frequency;
        assert!(d.min <= d.p05 && d.p05 <= d.mean && d.mean <= d.p95 && d.p95 <= d.max);
        assert!(d.std > 0.0);
    }

    #[test]
    fn capacitor_tolerance_sets_frequency_spread() {
        // Passive lag: fn ~ (R C)^-1/2, so its relative sigma is half of C's (5 % / 3).
        let r = [1e4];
        let rep = monte_carlo(FilterKind::PassiveLag, &s_params(), &r, 1e-6, &opts(0.0, 0.05)).unwrap();
        let d = rep.natural_frequency;
        let rel = d.std / d.mean;
        let expected = 0.5 * 0.05 / 3.0;
        assert!((rel - expected).abs() < 0.15 * expected, "relative sigma {rel} vs {expected}");
    }

    #[test]
    fn summarize_percentiles() {
        let d = summarize((1..=100).map(f64::from).collect()).unwrap();
        assert_eq!(d.min, 1.0);
        assert_eq!(d.p05, 5.0);
        assert_eq!(d.p95, 95.0);
        assert_eq!(d.max, 100.0);
        assert!((d.mean - 50.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_bad_tolerance() {
        let err = monte_carlo(FilterKind::PassiveLag, &s_params(), &[1e4], 1e-6, &opts(1.5, 0.0)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
