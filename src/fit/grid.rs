//! Log-spaced search grids.
//!
//! Component values span decades, so the design search starts from a
//! deterministic log-spaced grid over the allowed resistor range before the
//! local refinement. The same spacing is used for frequency scans.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::input(format!(
            "Invalid range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::input("Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    let mut out = Vec::with_capacity(steps);
    for i in 0..steps {
        out.push((ln_min + step * i as f64).exp());
    }
    Ok(out)
}

/// All `count`-tuples of resistor values drawn from a log grid.
///
/// `count = 1` yields `[[r]]`, `count = 2` the full cartesian product.
pub fn resistor_grid(count: usize, min: f64, max: f64, steps: usize) -> Result<Vec<Vec<f64>>, AppError> {
    let values = log_space(min, max, steps)?;
    let mut out: Vec<Vec<f64>> = vec![Vec::new()];
    for _ in 0..count {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |&v| {
                    let mut next = prefix.clone();
                    next.push(v);
                    next
                })
            })
            .collect();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn log_space_rejects_bad_ranges() {
        assert!(log_space(0.0, 1.0, 5).is_err());
        assert!(log_space(2.0, 1.0, 5).is_err());
        assert!(log_space(1.0, 2.0, 1).is_err());
    }

    #[test]
    fn resistor_grid_is_cartesian() {
        let grid = resistor_grid(2, 1e2, 1e4, 3).unwrap();
        assert_eq!(grid.len(), 9);
        assert!(grid.iter().all(|r| r.len() == 2));
        assert_eq!(resistor_grid(1, 1e2, 1e4, 3).unwrap().len(), 3);
    }
}
