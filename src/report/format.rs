//! Terminal formatting for analysis, design, VCO, step and tolerance results.
//!
//! Value lines follow one layout throughout: a 20-column label, a 14-column
//! right-aligned number, then the unit in brackets.

use crate::domain::{ESeries, PoleInfo};
use crate::fit::{Spread, ToleranceReport};
use crate::io::{VcoData, VcoFit};
use crate::report::{AnalysisReport, Banner, DesignReport, banner};
use crate::sim::StepMetrics;

/// Format the `analyze` output.
pub fn format_analysis(r: &AnalysisReport, color: bool) -> String {
    let mut out = String::new();

    out.push_str(&banner("Analyzing PLL Loop", Banner::Title, color));
    out.push('\n');
    out.push_str(&format!("Parameters: {}\n", r.params_path.display()));
    out.push_str(&format!(
        "Filter: {} | R = {} | C = {}\n",
        r.model.kind.display_name(),
        fmt_list(&r.resistors, "Ohm"),
        fmt_eng(r.capacitor, "F"),
    ));
    let s = &r.s_parameters;
    out.push_str(&format!(
        "Loop gain K = {:.4e} [1/s] (k_pd={:.4} V/rad, k_vco={:.4e} rad/s/V, k_n={})\n",
        r.model.gain, s.k_pd, s.k_vco, s.k_n
    ));
    out.push_str(&value_line("tau1:", r.model.tau1 * 1e3, 4, "ms"));
    if r.model.kind != crate::domain::FilterKind::PassiveLag {
        out.push_str(&value_line("tau2:", r.model.tau2 * 1e3, 4, "ms"));
    }
    if let Some(vco) = &r.vco {
        out.push_str(&format!(
            "k_vco measured: {:.4e} rad/s/V ({} points, R^2={:.5})\n",
            vco.k_vco, vco.points_used, vco.r_squared
        ));
    }

    let corners = r.model.filter_corners();
    out.push_str(&value_line("Filter pole:", corners.pole, 2, "Hz"));
    if let Some(zero) = corners.zero {
        out.push_str(&value_line("Filter zero:", zero, 2, "Hz"));
    }

    for (i, pole) in r.poles.iter().enumerate() {
        out.push_str(&banner(&format!("Pole: {i}"), Banner::Section, color));
        out.push('\n');
        out.push_str(&format_pole(pole));
    }
    for z in &r.zeros {
        let location = format!("{:.4e}{:+.4e}j", z.re, z.im);
        out.push_str(&format!("{:20} {:>14} [1/s]\n", "Closed-loop zero:", location));
    }

    out.push_str(&banner("Second order (closed form)", Banner::Section, color));
    out.push('\n');
    out.push_str(&value_line("Natural frequency:", r.second_order.natural_frequency, 2, "Hz"));
    out.push_str(&value_line("Damping factor:", r.second_order.damping_factor, 2, "-"));

    out.push_str(&banner("Stability", Banner::Section, color));
    out.push('\n');
    match &r.margins {
        Some(m) => {
            out.push_str(&value_line("Crossover:", m.crossover_frequency, 2, "Hz"));
            out.push_str(&value_line("Phase margin:", m.phase_margin, 2, "deg"));
        }
        None => out.push_str("No unity-gain crossover found.\n"),
    }

    out
}

fn format_pole(p: &PoleInfo) -> String {
    let mut out = String::new();
    let location = format!("{:.4e}{:+.4e}j", p.pole.re, p.pole.im);
    out.push_str(&format!("{:20} {:>14} [1/s]\n", "Location:", location));
    out.push_str(&value_line("Natural frequency:", p.natural_frequency, 2, "Hz"));
    out.push_str(&value_line("Damping factor:", p.damping_factor, 2, "-"));
    out
}

/// Format the `design` output.
pub fn format_design(r: &DesignReport, color: bool) -> String {
    let mut out = String::new();
    let fit = &r.fit;

    out.push_str(&banner("Designing PLL Loop Filter", Banner::Title, color));
    out.push('\n');
    out.push_str(&format!(
        "Filter: {} | C = {}\n",
        fit.kind.display_name(),
        fmt_eng(r.capacitor, "F")
    ));
    if let Some(vco) = &r.vco {
        out.push_str(&format!("k_vco measured: {:.4e} rad/s/V\n", vco.k_vco));
    }
    out.push_str(&value_line("Target frequency:", fit.target.natural_frequency, 2, "Hz"));
    out.push_str(&value_line("Target damping:", fit.target.damping_factor, 3, "-"));

    out.push_str(&banner("Fitted", Banner::Section, color));
    out.push('\n');
    for (i, &value) in fit.resistors.iter().enumerate() {
        out.push_str(&format!("{:20} {:>14} [Ohm]\n", format!("R{}:", i + 1), fmt_sig(value)));
    }
    out.push_str(&value_line("Natural frequency:", fit.achieved.natural_frequency, 2, "Hz"));
    out.push_str(&value_line("Damping factor:", fit.achieved.damping_factor, 3, "-"));
    out.push_str(&format!(
        "{:20} {:>14.3e} [-] ({} iterations{})\n",
        "Residual:",
        fit.cost.sqrt(),
        fit.iterations,
        if fit.converged { "" } else { ", not converged" }
    ));

    if r.series != ESeries::None {
        out.push_str(&banner(
            &format!("Standard values ({})", r.series.display_name()),
            Banner::Section,
            color,
        ));
        out.push('\n');
        for (i, &value) in r.standard_r.iter().enumerate() {
            out.push_str(&format!("{:20} {:>14} [Ohm]\n", format!("R{}:", i + 1), fmt_eng(value, "").trim_end()));
        }
        out.push_str(&value_line("Natural frequency:", r.standard.natural_frequency, 2, "Hz"));
        out.push_str(&value_line("Damping factor:", r.standard.damping_factor, 3, "-"));
    }

    if !fit.target_reached {
        out.push_str(&banner("Target not reached", Banner::Warning, color));
        out.push('\n');
        match &r.closed_form {
            Some(exact) => out.push_str(&format!(
                "Exact solution {} lies outside the resistor search range.\n",
                fmt_list(exact, "Ohm")
            )),
            None => out.push_str(&format!(
                "A {} filter with this capacitor cannot reach both targets; showing the least-squares compromise.\n",
                fit.kind.display_name()
            )),
        }
    }

    out
}

/// Format the `vco` output.
pub fn format_vco(data: &VcoData, fit: &VcoFit, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&banner("VCO Gain", Banner::Title, color));
    out.push('\n');
    out.push_str(&format!(
        "Rows: read={} valid={} used={} | V=[{:.3}, {:.3}]\n",
        data.rows_read,
        data.samples.len(),
        fit.points_used,
        fit.v_range.0,
        fit.v_range.1
    ));
    out.push_str(&value_line("k_vco:", fit.k_vco, 2, "rad/s/V"));
    out.push_str(&value_line("Slope:", fit.slope, 2, "Hz/V"));
    out.push_str(&value_line("f0:", fit.f0, 2, "Hz"));
    out.push_str(&value_line("R^2:", fit.r_squared, 5, "-"));
    out.push_str(&value_line("RMS residual:", fit.rms, 2, "Hz"));

    if !data.row_errors.is_empty() {
        out.push_str(&banner(
            &format!("Skipped {} row(s)", data.row_errors.len()),
            Banner::Warning,
            color,
        ));
        out.push('\n');
        for e in &data.row_errors {
            out.push_str(&format!("  line {}: {}\n", e.line, e.message));
        }
    }
    out
}

/// Format step-response figures of merit.
pub fn format_step_metrics(m: &StepMetrics, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&banner("Step Response", Banner::Title, color));
    out.push('\n');
    out.push_str(&value_line("Final value:", m.final_value, 4, "-"));
    out.push_str(&value_line("Peak:", m.peak, 4, "-"));
    out.push_str(&value_line("Peak time:", m.peak_time * 1e3, 3, "ms"));
    out.push_str(&value_line("Overshoot:", m.overshoot_percent, 2, "%"));
    out.push_str(&optional_line("Rise time 10-90%:", m.rise_time.map(|t| t * 1e3), "ms"));
    out.push_str(&optional_line("Settling time 2%:", m.settling_time.map(|t| t * 1e3), "ms"));
    out
}

/// Format a Monte Carlo tolerance report.
pub fn format_tolerance(r: &ToleranceReport, color: bool) -> String {
    let mut out = String::new();
    out.push_str(&banner("Tolerance Analysis", Banner::Title, color));
    out.push('\n');
    out.push_str(&format!(
        "Samples: {} | R tolerance: {:.1}% | C tolerance: {:.1}% (3 sigma)\n",
        r.samples,
        r.tolerance.r * 100.0,
        r.tolerance.c * 100.0
    ));
    out.push_str(&spread_table(&[
        ("fn [Hz]", r.natural_frequency),
        ("zeta [-]", r.damping_factor),
    ]));
    out
}

fn spread_table(rows: &[(&str, Spread)]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
        "", "mean", "std", "min", "p05", "p95", "max"
    ));
    for (name, d) in rows {
        out.push_str(&format!(
            "{:<10} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3} {:>10.3}\n",
            name, d.mean, d.std, d.min, d.p05, d.p95, d.max
        ));
    }
    out
}

fn value_line(label: &str, value: f64, decimals: usize, unit: &str) -> String {
    format!("{label:20} {value:>14.decimals$} [{unit}]\n")
}

fn optional_line(label: &str, value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => value_line(label, v, 3, unit),
        None => format!("{label:20} {:>14} [{unit}]\n", "n/a"),
    }
}

/// Engineering notation with an SI prefix: `4700 Ohm` -> `4.700 kOhm`.
pub fn fmt_eng(value: f64, unit: &str) -> String {
    const PREFIXES: [(i32, &str); 8] = [
        (-12, "p"),
        (-9, "n"),
        (-6, "u"),
        (-3, "m"),
        (0, ""),
        (3, "k"),
        (6, "M"),
        (9, "G"),
    ];
    if value == 0.0 || !value.is_finite() {
        return format!("{value:.3} {unit}");
    }
    let exp = ((value.abs().log10() / 3.0).floor() as i32 * 3).clamp(-12, 9);
    let prefix = PREFIXES
        .iter()
        .find(|(e, _)| *e == exp)
        .map_or("", |(_, p)| p);
    let mantissa = value / 10f64.powi(exp);
    format!("{mantissa:.3} {prefix}{unit}")
}

fn fmt_sig(value: f64) -> String {
    format!("{value:.1}")
}

fn fmt_list(values: &[f64], unit: &str) -> String {
    let parts: Vec<String> = values.iter().map(|v| fmt_eng(*v, unit)).collect();
    format!("[{}]", parts.join(", "))
}
