//! Unit step response of a transfer function.
//!
//! The transfer function is realized in controllable canonical form
//!
//! ```text
//! x' = A x + B u,   y = C x + D u
//! ```
//!
//! and integrated with fixed-step RK4 for `u = 1`. Each output interval is
//! split into enough sub-steps that `h * max|pole| <= 0.1`, which keeps RK4
//! well inside its stability region for the loop orders we handle.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::models::TransferFunction;

/// Largest `h * |pole|` allowed per RK4 step.
const MAX_STEP_PRODUCT: f64 = 0.1;
/// Upper bound on RK4 sub-steps per output sample.
const MAX_SUBSTEPS: usize = 10_000;
/// Settling band (fraction of the final value).
const SETTLING_BAND: f64 = 0.02;

/// Step response settings.
#[derive(Debug, Clone)]
pub struct StepOptions {
    /// Simulated time [s]; `None` picks a horizon from the slowest pole.
    pub duration: Option<f64>,
    /// Number of output samples (including `t = 0`).
    pub samples: usize,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            duration: None,
            samples: 1000,
        }
    }
}

/// Sampled step response.
#[derive(Debug, Clone)]
pub struct StepResponse {
    /// [s]
    pub time: Vec<f64>,
    pub response: Vec<f64>,
}

/// Figures of merit of a step response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepMetrics {
    pub final_value: f64,
    pub peak: f64,
    /// [s]
    pub peak_time: f64,
    /// Peak above the final value [%]; zero when there is none.
    pub overshoot_percent: f64,
    /// 10-90 % rise time [s].
    pub rise_time: Option<f64>,
    /// 2 % settling time [s]; `None` if the response has not settled by the end.
    pub settling_time: Option<f64>,
}

/// Simulate the unit step response of `tf`.
pub fn step_response(tf: &TransferFunction, opts: &StepOptions) -> Result<StepResponse, AppError> {
    if !tf.is_proper() {
        return Err(AppError::numeric("Step response needs a proper transfer function."));
    }
    if opts.samples < 2 {
        return Err(AppError::input("Step response needs at least 2 samples."));
    }

    let poles = tf.poles()?;
    let duration = match opts.duration {
        Some(d) if d.is_finite() && d > 0.0 => d,
        Some(d) => return Err(AppError::input(format!("Invalid step duration {d}."))),
        None => default_duration(&poles),
    };

    let (a, b, c, d) = realize(tf);
    let n = b.len();
    let dt = duration / (opts.samples as f64 - 1.0);
    let fastest = poles.iter().map(|p| p.norm()).fold(0.0, f64::max);
    let substeps = ((dt * fastest / MAX_STEP_PRODUCT).ceil() as usize).clamp(1, MAX_SUBSTEPS);
    let h = dt / substeps as f64;

    let f = |x: &DVector<f64>| &a * x + &b;

    let mut x = DVector::<f64>::zeros(n);
    let mut time = Vec::with_capacity(opts.samples);
    let mut response = Vec::with_capacity(opts.samples);

    for i in 0..opts.samples {
        time.push(i as f64 * dt);
        response.push(c.dot(&x) + d);
        if i + 1 == opts.samples {
            break;
        }
        for _ in 0..substeps {
            let k1 = f(&x);
            let k2 = f(&(&x + &k1 * (h / 2.0)));
            let k3 = f(&(&x + &k2 * (h / 2.0)));
            let k4 = f(&(&x + &k3 * h));
            x += (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0);
        }
    }

    if response.iter().any(|y| !y.is_finite()) {
        return Err(AppError::numeric("Step response diverged."));
    }
    Ok(StepResponse { time, response })
}

/// Ten time constants of the slowest stable pole, or 1 s without one.
fn default_duration(poles: &[nalgebra::Complex<f64>]) -> f64 {
    poles
        .iter()
        .filter(|p| p.re < 0.0)
        .map(|p| -p.re)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .map_or(1.0, |slowest| 10.0 / slowest)
}

/// Controllable canonical realization `(A, B, C, D)`.
fn realize(tf: &TransferFunction) -> (DMatrix<f64>, DVector<f64>, DVector<f64>, f64) {
    let den = tf.den();
    let n = den.len() - 1;
    let lead = den[0];
    let a_coef: Vec<f64> = den.iter().map(|v| v / lead).collect();

    // Pad the numerator to n+1 coefficients.
    let mut b_coef = vec![0.0; n + 1 - tf.num().len()];
    b_coef.extend(tf.num().iter().map(|v| v / lead));

    // Split off the direct feed-through term.
    let d = b_coef[0];
    let c_coef: Vec<f64> = (1..=n).map(|i| b_coef[i] - d * a_coef[i]).collect();

    let mut a = DMatrix::<f64>::zeros(n, n);
    for j in 0..n {
        a[(0, j)] = -a_coef[j + 1];
    }
    for i in 1..n {
        a[(i, i - 1)] = 1.0;
    }
    let mut b = DVector::<f64>::zeros(n);
    if n > 0 {
        b[0] = 1.0;
    }

    (a, b, DVector::from_vec(c_coef), d)
}

/// Compute the step metrics; `final_value` defaults to the DC gain of `tf`.
pub fn step_metrics(tf: &TransferFunction, step: &StepResponse) -> Result<StepMetrics, AppError> {
    let (time, y) = (&step.time, &step.response);
    let last = *y
        .last()
        .ok_or_else(|| AppError::numeric("Empty step response."))?;
    let final_value = tf.dc_gain().unwrap_or(last);

    let (peak_idx, &peak) = y
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| AppError::numeric("Empty step response."))?;

    let overshoot_percent = if final_value != 0.0 && peak > final_value {
        (peak - final_value) / final_value.abs() * 100.0
    } else {
        0.0
    };

    let rise_time = match (
        crossing_time(time, y, 0.1 * final_value),
        crossing_time(time, y, 0.9 * final_value),
    ) {
        (Some(t10), Some(t90)) if final_value > 0.0 => Some(t90 - t10),
        _ => None,
    };

    let band = SETTLING_BAND * final_value.abs();
    let settling_time = match y.iter().rposition(|v| (v - final_value).abs() > band) {
        None => Some(0.0),
        Some(idx) if idx + 1 < y.len() => Some(time[idx + 1]),
        Some(_) => None,
    };

    Ok(StepMetrics {
        final_value,
        peak,
        peak_time: time[peak_idx],
        overshoot_percent,
        rise_time,
        settling_time,
    })
}

/// First time `y` reaches `level` (rising), linearly interpolated.
fn crossing_time(time: &[f64], y: &[f64], level: f64) -> Option<f64> {
    if y.first().is_some_and(|&v| v >= level) {
        return time.first().copied();
    }
    let i = y.windows(2).position(|w| w[0] < level && w[1] >= level)?;
    let frac = (level - y[i]) / (y[i + 1] - y[i]);
    Some(time[i] + frac * (time[i + 1] - time[i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_order_matches_exponential() {
        // 10/(s + 10): y = 1 - exp(-10 t)
        let tf = TransferFunction::new(&[10.0], &[1.0, 10.0]).unwrap();
        let step = step_response(
            &tf,
            &StepOptions {
                duration: Some(1.0),
                samples: 101,
            },
        )
        .unwrap();
        assert_eq!(step.response[0], 0.0);
        for (t, y) in step.time.iter().zip(&step.response) {
            assert!((y - (1.0 - (-10.0 * t).exp())).abs() < 1e-6, "t={t}");
        }
    }

    #[test]
    fn second_order_overshoot_matches_theory() {
        // wn = 10 rad/s, zeta = 0.5, no zero
        let tf = TransferFunction::new(&[100.0], &[1.0, 10.0, 100.0]).unwrap();
        let step = step_response(&tf, &StepOptions::default()).unwrap();
        let m = step_metrics(&tf, &step).unwrap();

        let zeta: f64 = 0.5;
        let expected = 100.0 * (-std::f64::consts::PI * zeta / (1.0 - zeta * zeta).sqrt()).exp();
        assert!((m.overshoot_percent - expected).abs() < 0.05, "{}", m.overshoot_percent);
        assert_eq!(m.final_value, 1.0);
        assert!(m.rise_time.unwrap() > 0.0);
        // Default horizon is 10 / 5 = 2 s; the 2 % envelope settles around 0.8 s.
        let ts = m.settling_time.unwrap();
        assert!(ts > 0.5 && ts < 1.2, "ts={ts}");
    }

    #[test]
    fn biproper_system_has_feedthrough() {
        // (s + 2)/(s + 1): y(0) = 1, y(inf) = 2
        let tf = TransferFunction::new(&[1.0, 2.0], &[1.0, 1.0]).unwrap();
        let step = step_response(
            &tf,
            &StepOptions {
                duration: Some(10.0),
                samples: 201,
            },
        )
        .unwrap();
        assert!((step.response[0] - 1.0).abs() < 1e-12);
        assert!((step.response[200] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn improper_system_is_rejected() {
        let tf = TransferFunction::new(&[1.0, 0.0, 0.0], &[1.0, 1.0]).unwrap();
        assert!(step_response(&tf, &StepOptions::default()).is_err());
    }

    #[test]
    fn unsettled_response_reports_none() {
        let tf = TransferFunction::new(&[1.0], &[1.0, 1.0]).unwrap();
        let step = step_response(
            &tf,
            &StepOptions {
                duration: Some(1.0),
                samples: 11,
            },
        )
        .unwrap();
        let m = step_metrics(&tf, &step).unwrap();
        assert_eq!(m.settling_time, None);
        assert_eq!(m.overshoot_percent, 0.0);
    }
}
