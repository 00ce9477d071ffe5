//! Rounding to IEC 60063 preferred values.

use crate::domain::ESeries;

const E6: [f64; 6] = [1.0, 1.5, 2.2, 3.3, 4.7, 6.8];
const E12: [f64; 12] = [1.0, 1.2, 1.5, 1.8, 2.2, 2.7, 3.3, 3.9, 4.7, 5.6, 6.8, 8.2];
const E24: [f64; 24] = [
    1.0, 1.1, 1.2, 1.3, 1.5, 1.6, 1.8, 2.0, 2.2, 2.4, 2.7, 3.0, 3.3, 3.6, 3.9, 4.3, 4.7, 5.1, 5.6, 6.2,
    6.8, 7.5, 8.2, 9.1,
];

/// Mantissas of one decade, in `[1, 10)`.
///
/// E48/E96 follow `round(10^(i/n), 2)` exactly; the coarser series carry
/// historical values and are tabulated.
pub fn decade_values(series: ESeries) -> Vec<f64> {
    match series {
        ESeries::None => Vec::new(),
        ESeries::E6 => E6.to_vec(),
        ESeries::E12 => E12.to_vec(),
        ESeries::E24 => E24.to_vec(),
        ESeries::E48 => geometric(48),
        ESeries::E96 => geometric(96),
    }
}

fn geometric(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (100.0 * 10f64.powf(i as f64 / n as f64)).round() / 100.0)
        .collect()
}

/// Nearest preferred value to `value` (nearest in ratio, not difference).
///
/// `ESeries::None` and non-positive inputs return `value` unchanged.
pub fn nearest(value: f64, series: ESeries) -> f64 {
    if series == ESeries::None || !(value.is_finite() && value > 0.0) {
        return value;
    }

    let decade = value.log10().floor() as i32;
    let mantissa = value / 10f64.powi(decade);

    let mut candidates = decade_values(series);
    candidates.push(10.0);
    // Guard the lower edge against log10 rounding (e.g. 0.99999 in the next decade).
    candidates.push(decade_values(series).last().copied().unwrap_or(1.0) / 10.0);

    let best = candidates
        .into_iter()
        .min_by(|a, b| {
            (a / mantissa).ln().abs().total_cmp(&(b / mantissa).ln().abs())
        })
        .unwrap_or(mantissa);

    scale(best, decade)
}

/// `mantissa * 10^decade` without accumulating binary noise (`4.7e3` -> `4700.0`).
fn scale(mantissa: f64, decade: i32) -> f64 {
    let units = (mantissa * 100.0).round();
    let exp = decade - 2;
    if exp >= 0 {
        units * 10f64.powi(exp)
    } else {
        units / 10f64.powi(-exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e96_has_known_entries() {
        let e96 = decade_values(ESeries::E96);
        assert_eq!(e96.len(), 96);
        assert_eq!(e96[0], 1.0);
        assert_eq!(e96[1], 1.02);
        assert!(e96.contains(&4.99));
        assert_eq!(decade_values(ESeries::E48)[1], 1.05);
    }

    #[test]
    fn nearest_picks_standard_values() {
        assert_eq!(nearest(4600.0, ESeries::E12), 4700.0);
        assert_eq!(nearest(806_000.0, ESeries::E24), 820_000.0);
        assert_eq!(nearest(4488.0, ESeries::E24), 4300.0);
        assert_eq!(nearest(0.0123, ESeries::E6), 0.015);
        assert_eq!(nearest(9.8, ESeries::E6), 10.0);
    }

    #[test]
    fn none_and_invalid_pass_through() {
        assert_eq!(nearest(1234.5, ESeries::None), 1234.5);
        assert_eq!(nearest(-1.0, ESeries::E24), -1.0);
    }
}
