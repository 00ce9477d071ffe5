//! Shared workflow used by every `pll` mode.
//!
//! parameter file -> validation -> optional VCO measurement -> loop model
//! -> (poles | design | step | tolerance)
//!
//! The CLI handlers in `app` only deal with printing and exports.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::cli::VcoOverride;
use crate::domain::{DesignFile, DesignRecord, ESeries, FilterKind, Parameters, SecondOrder};
use crate::error::AppError;
use crate::fit::{
    DesignOptions, ToleranceOptions, ToleranceReport, closed_form_resistors, design_filter,
    eseries, monte_carlo,
};
use crate::io::{VcoFit, extract_vco_gain, read_parameters, resolve_params_path, resolve_relative};
use crate::models::{LoopModel, analyze_poles};
use crate::report::{AnalysisReport, DesignReport};
use crate::sim::{StepMetrics, StepOptions, StepResponse, step_metrics, step_response};

/// A validated parameter file, with `k_vco` already replaced by a measured
/// value when one was requested.
#[derive(Debug, Clone)]
pub struct LoadedParameters {
    pub path: PathBuf,
    pub params: Parameters,
    pub kind: FilterKind,
    pub vco: Option<VcoFit>,
}

impl LoadedParameters {
    pub fn resistors(&self) -> &[f64] {
        &self.params.loop_filter.r
    }

    pub fn capacitor(&self) -> f64 {
        self.params.loop_filter.c[0]
    }

    pub fn model(&self) -> Result<LoopModel, AppError> {
        LoopModel::new(
            self.kind,
            &self.params.s_parameters,
            self.resistors(),
            self.capacitor(),
        )
    }
}

/// Design targets and search settings after merging the `Design` section
/// with command-line overrides.
#[derive(Debug, Clone)]
pub struct DesignRequest {
    pub natural_frequency: Option<f64>,
    pub damping_factor: Option<f64>,
    pub r_min: Option<f64>,
    pub r_max: Option<f64>,
    pub series: Option<ESeries>,
    pub grid_steps: usize,
}

/// Outputs of a design run.
#[derive(Debug, Clone)]
pub struct DesignOutput {
    pub report: DesignReport,
    /// Parameter file with the designed resistors, ready for `--export`.
    pub export: DesignFile,
}

/// Load and validate the parameter file, then apply any VCO measurement.
///
/// A `--vco-csv` on the command line wins over the file's `VCO` section.
pub fn load(cli_params: Option<&Path>, vco: &VcoOverride) -> Result<LoadedParameters, AppError> {
    let path = resolve_params_path(cli_params);
    let mut params = read_parameters(&path)?;
    let kind = params.validate()?;

    let source = match (&vco.vco_csv, &params.vco) {
        (Some(csv), _) => Some((csv.clone(), vco.vco_v_min, vco.vco_v_max)),
        (None, Some(spec)) => Some((
            resolve_relative(&path, &spec.measurements),
            vco.vco_v_min.or(spec.v_min),
            vco.vco_v_max.or(spec.v_max),
        )),
        (None, None) => None,
    };

    let vco = match source {
        Some((csv, v_min, v_max)) => {
            let (_, fit) = extract_vco_gain(&csv, v_min, v_max)?;
            params.s_parameters.k_vco = fit.k_vco;
            Some(fit)
        }
        None => None,
    };

    Ok(LoadedParameters {
        path,
        params,
        kind,
        vco,
    })
}

/// Poles, closed-form figures and margins of the loaded loop.
pub fn analyze(loaded: &LoadedParameters) -> Result<AnalysisReport, AppError> {
    let model = loaded.model()?;
    let closed = model.closed_loop()?;
    let poles = analyze_poles(&closed)?;
    let zeros = closed.zeros()?;

    Ok(AnalysisReport {
        params_path: loaded.path.clone(),
        s_parameters: loaded.params.s_parameters,
        model,
        resistors: loaded.resistors().to_vec(),
        capacitor: loaded.capacitor(),
        poles,
        zeros,
        second_order: model.second_order(),
        margins: model.margins()?,
        vco: loaded.vco.clone(),
    })
}

/// Merge the file's `Design` section with command-line overrides.
pub fn design_request(params: &Parameters, cli: DesignRequest) -> DesignRequest {
    let file = params.design.clone().unwrap_or_default();
    DesignRequest {
        natural_frequency: cli.natural_frequency.or(file.natural_frequency),
        damping_factor: cli.damping_factor.or(file.damping_factor),
        r_min: cli.r_min.or(file.r_min),
        r_max: cli.r_max.or(file.r_max),
        series: cli.series.or(file.series),
        grid_steps: cli.grid_steps,
    }
}

/// Fit the loop filter resistors and round them to the requested series.
pub fn design(loaded: &LoadedParameters, request: &DesignRequest) -> Result<DesignOutput, AppError> {
    let natural_frequency = request.natural_frequency.ok_or_else(|| {
        AppError::input("No target natural frequency: set Design.natural_frequency or pass --natural-frequency.")
    })?;
    let damping_factor = request.damping_factor.ok_or_else(|| {
        AppError::input("No target damping factor: set Design.damping_factor or pass --damping-factor.")
    })?;
    let target = SecondOrder {
        natural_frequency,
        damping_factor,
    };

    let defaults = DesignOptions::default();
    let opts = DesignOptions {
        r_min: request.r_min.unwrap_or(defaults.r_min),
        r_max: request.r_max.unwrap_or(defaults.r_max),
        grid_steps: request.grid_steps,
        ..defaults
    };

    let s = loaded.params.s_parameters;
    let c = loaded.capacitor();
    let fit = design_filter(loaded.kind, &s, c, target, &opts)?;

    let series = request.series.unwrap_or(ESeries::E24);
    let standard_r: Vec<f64> = fit
        .resistors
        .iter()
        .map(|&r| eseries::nearest(r, series))
        .collect();
    let standard = LoopModel::new(loaded.kind, &s, &standard_r, c)?.second_order();
    let closed_form = if fit.target_reached {
        None
    } else {
        closed_form_resistors(loaded.kind, &s, c, target)
    };

    let mut parameters = loaded.params.clone();
    parameters.loop_filter.r = standard_r.clone();
    let export = DesignFile {
        parameters,
        result: DesignRecord {
            tool: format!("pll {}", env!("CARGO_PKG_VERSION")),
            generated: Utc::now(),
            filter: loaded.kind,
            target,
            fitted_r: fit.resistors.clone(),
            fitted: fit.achieved,
            series,
            standard_r: standard_r.clone(),
            standard,
        },
    };

    Ok(DesignOutput {
        report: DesignReport {
            fit,
            capacitor: c,
            series,
            standard_r,
            standard,
            closed_form,
            vco: loaded.vco.clone(),
        },
        export,
    })
}

/// Closed-loop step response and its figures of merit.
pub fn step(
    loaded: &LoadedParameters,
    opts: &StepOptions,
) -> Result<(StepResponse, StepMetrics), AppError> {
    let closed = loaded.model()?.closed_loop()?;
    let response = step_response(&closed, opts)?;
    let metrics = step_metrics(&closed, &response)?;
    Ok((response, metrics))
}

/// Monte Carlo spread of the loop figures.
pub fn tolerance(
    loaded: &LoadedParameters,
    opts: &ToleranceOptions,
) -> Result<ToleranceReport, AppError> {
    monte_carlo(
        loaded.kind,
        &loaded.params.s_parameters,
        loaded.resistors(),
        loaded.capacitor(),
        opts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_params(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pll_pipeline_{}_{name}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("parameters.json");
        fs::write(&path, body).unwrap();
        path
    }

    const LAG_LEAD: &str = r#"{
        "S Parameters": { "k_vco": 2.0e5, "k_pd": 0.4, "k_n": 10.0 },
        "Loop Filter": { "Type": "Passive", "R": [47000.0, 2200.0], "C": [1.0e-7] },
        "Design": { "natural_frequency": 60.0, "damping_factor": 0.7, "series": "E96" }
    }"#;

    #[test]
    fn analyze_reports_two_closed_loop_poles() {
        let path = write_params("analyze", LAG_LEAD);
        let loaded = load(Some(&path), &VcoOverride::default()).unwrap();
        let report = analyze(&loaded).unwrap();

        assert_eq!(loaded.kind, FilterKind::PassiveLagLead);
        assert_eq!(report.poles.len(), 2);
        for p in &report.poles {
            assert!(p.pole.re < 0.0);
            assert!((p.natural_frequency - report.second_order.natural_frequency).abs() < 1e-6 * p.natural_frequency);
        }
        assert!(report.vco.is_none());

        // Lag-lead closed loop keeps the filter zero at -1/tau2.
        assert_eq!(report.zeros.len(), 1);
        let tau2 = 2200.0 * 1.0e-7;
        assert!((report.zeros[0].re + 1.0 / tau2).abs() < 1e-9 / tau2);
    }

    const SATURATED_VCO: &str = "voltage,frequency\n0.0,1000.0\n1.0,1000.0\n2.0,2000.0\n3.0,3000.0\n5.0,3000.0\n";

    fn params_with_vco_section(name: &str) -> PathBuf {
        let path = write_params(
            name,
            r#"{
                "S Parameters": { "k_vco": 1.0, "k_pd": 0.4, "k_n": 1.0 },
                "Loop Filter": { "Type": "passive", "R": [10000.0], "C": [1.0e-6] },
                "VCO": { "measurements": "vco.csv", "v_min": 0.0, "v_max": 5.0 }
            }"#,
        );
        fs::write(path.with_file_name("vco.csv"), SATURATED_VCO).unwrap();
        path
    }

    #[test]
    fn command_line_window_overrides_vco_section_window() {
        let path = params_with_vco_section("vco_window");

        let wide = load(Some(&path), &VcoOverride::default()).unwrap();
        assert_eq!(wide.vco.as_ref().unwrap().points_used, 5);

        let narrow = load(
            Some(&path),
            &VcoOverride {
                vco_csv: None,
                vco_v_min: Some(1.0),
                vco_v_max: Some(3.0),
            },
        )
        .unwrap();
        let fit = narrow.vco.unwrap();
        assert_eq!(fit.points_used, 3);
        assert!((fit.slope - 1000.0).abs() < 1e-9);
        assert!((narrow.params.s_parameters.k_vco - 2.0 * std::f64::consts::PI * 1000.0).abs() < 1e-6);
    }

    #[test]
    fn command_line_csv_wins_over_vco_section() {
        let path = params_with_vco_section("vco_csv");
        let other = path.with_file_name("bench.csv");
        fs::write(&other, "v,f\n1.0,500.0\n2.0,1000.0\n3.0,1500.0\n").unwrap();

        let loaded = load(
            Some(&path),
            &VcoOverride {
                vco_csv: Some(other),
                vco_v_min: None,
                vco_v_max: None,
            },
        )
        .unwrap();
        let fit = loaded.vco.unwrap();
        assert_eq!(fit.points_used, 3);
        assert!((fit.slope - 500.0).abs() < 1e-9);
    }

    #[test]
    fn vco_section_replaces_k_vco() {
        let path = write_params(
            "vco",
            r#"{
                "S Parameters": { "k_vco": 1.0, "k_pd": 0.4, "k_n": 1.0 },
                "Loop Filter": { "Type": "passive", "R": [10000.0], "C": [1.0e-6] },
                "VCO": { "measurements": "vco.csv" }
            }"#,
        );
        fs::write(
            path.with_file_name("vco.csv"),
            "voltage,frequency\n1.0,1000.0\n2.0,2000.0\n3.0,3000.0\n",
        )
        .unwrap();

        let loaded = load(Some(&path), &VcoOverride::default()).unwrap();
        let expected = 2.0 * std::f64::consts::PI * 1000.0;
        assert!((loaded.params.s_parameters.k_vco - expected).abs() < 1e-6 * expected);
        assert!(loaded.vco.is_some());
    }

    #[test]
    fn design_merges_file_targets_with_overrides() {
        let path = write_params("design", LAG_LEAD);
        let loaded = load(Some(&path), &VcoOverride::default()).unwrap();
        let request = design_request(
            &loaded.params,
            DesignRequest {
                natural_frequency: None,
                damping_factor: Some(0.8),
                r_min: None,
                r_max: None,
                series: None,
                grid_steps: 31,
            },
        );
        assert_eq!(request.natural_frequency, Some(60.0));
        assert_eq!(request.damping_factor, Some(0.8));
        assert_eq!(request.series, Some(ESeries::E96));

        let out = design(&loaded, &request).unwrap();
        let fit = &out.report.fit;
        assert!(fit.target_reached);
        assert!((fit.achieved.natural_frequency - 60.0).abs() < 1e-2);
        assert!((fit.achieved.damping_factor - 0.8).abs() < 1e-3);

        assert_eq!(out.export.parameters.loop_filter.r, out.report.standard_r);
        assert_eq!(out.export.result.fitted_r, fit.resistors);
        // The export is itself a loadable parameter file.
        assert_eq!(out.export.parameters.validate().unwrap(), FilterKind::PassiveLagLead);
    }

    #[test]
    fn design_without_target_is_an_input_error() {
        let path = write_params(
            "notarget",
            r#"{
                "S Parameters": { "k_vco": 2.0e5, "k_pd": 0.4, "k_n": 10.0 },
                "Loop Filter": { "Type": "active", "R": [47000.0, 2200.0], "C": [1.0e-7] }
            }"#,
        );
        let loaded = load(Some(&path), &VcoOverride::default()).unwrap();
        let request = design_request(
            &loaded.params,
            DesignRequest {
                natural_frequency: Some(50.0),
                damping_factor: None,
                r_min: None,
                r_max: None,
                series: None,
                grid_steps: 21,
            },
        );
        let err = design(&loaded, &request).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn step_settles_at_unity() {
        let path = write_params("step", LAG_LEAD);
        let loaded = load(Some(&path), &VcoOverride::default()).unwrap();
        let (response, metrics) = step(&loaded, &StepOptions::default()).unwrap();
        assert_eq!(response.time.len(), 1000);
        assert!((metrics.final_value - 1.0).abs() < 1e-9);
        assert!(metrics.settling_time.is_some());
    }
}
