//! Parameter-file schema and shared result types.
//!
//! The JSON keys (`"S Parameters"`, `"Loop Filter"`, ...) are the ones used by
//! the hand-maintained `parameters.json` files, so they are kept verbatim via
//! `serde(rename)`.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use nalgebra::Complex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Complete contents of a parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(rename = "S Parameters")]
    pub s_parameters: SParameters,
    #[serde(rename = "Loop Filter")]
    pub loop_filter: LoopFilterSpec,
    #[serde(rename = "Design", default, skip_serializing_if = "Option::is_none")]
    pub design: Option<DesignSpec>,
    #[serde(rename = "VCO", default, skip_serializing_if = "Option::is_none")]
    pub vco: Option<VcoSpec>,
    #[serde(rename = "Tolerance", default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<ToleranceSpec>,
}

/// Small-signal gains of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SParameters {
    /// VCO gain [rad/s/V].
    pub k_vco: f64,
    /// Phase detector gain [V/rad].
    pub k_pd: f64,
    /// Feedback divider ratio [-].
    pub k_n: f64,
}

impl SParameters {
    /// Loop gain `K = k_pd * k_vco / k_n` [1/s].
    pub fn loop_gain(&self) -> f64 {
        self.k_pd * self.k_vco / self.k_n
    }
}

/// Loop filter as written in the parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopFilterSpec {
    #[serde(rename = "Type")]
    pub kind: String,
    /// Resistor values [Ohm].
    #[serde(rename = "R")]
    pub r: Vec<f64>,
    /// Capacitor values [F].
    #[serde(rename = "C")]
    pub c: Vec<f64>,
}

/// Design targets and search settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DesignSpec {
    /// Target natural frequency [Hz].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natural_frequency: Option<f64>,
    /// Target damping factor [-].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damping_factor: Option<f64>,
    /// Smallest resistor the search may use [Ohm].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_min: Option<f64>,
    /// Largest resistor the search may use [Ohm].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r_max: Option<f64>,
    /// Preferred-value series used to round the fitted resistors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<ESeries>,
}

/// Where to find VCO measurements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VcoSpec {
    /// CSV file; relative paths are resolved against the parameter file.
    pub measurements: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_max: Option<f64>,
}

/// Relative component tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceSpec {
    #[serde(default = "default_r_tolerance")]
    pub r: f64,
    #[serde(default = "default_c_tolerance")]
    pub c: f64,
}

impl Default for ToleranceSpec {
    fn default() -> Self {
        Self {
            r: default_r_tolerance(),
            c: default_c_tolerance(),
        }
    }
}

fn default_r_tolerance() -> f64 {
    0.01
}

fn default_c_tolerance() -> f64 {
    0.05
}

/// IEC 60063 preferred-number series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum ESeries {
    /// No rounding.
    #[serde(alias = "none")]
    None,
    #[serde(alias = "e6")]
    E6,
    #[serde(alias = "e12")]
    E12,
    #[serde(alias = "e24")]
    E24,
    #[serde(alias = "e48")]
    E48,
    #[serde(alias = "e96")]
    E96,
}

impl ESeries {
    pub fn display_name(self) -> &'static str {
        match self {
            ESeries::None => "none",
            ESeries::E6 => "E6",
            ESeries::E12 => "E12",
            ESeries::E24 => "E24",
            ESeries::E48 => "E48",
            ESeries::E96 => "E96",
        }
    }
}

/// Concrete loop filter topology, resolved from `Type` and the resistor count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// `R1` + `C`: `F(s) = 1 / (1 + s*tau1)`.
    PassiveLag,
    /// `R1`, `R2` + `C`: `F(s) = (1 + s*tau2) / (1 + s*(tau1 + tau2))`.
    PassiveLagLead,
    /// Op-amp integrator with zero: `F(s) = (1 + s*tau2) / (s*tau1)`.
    ActivePi,
}

impl FilterKind {
    /// Resolve the topology from the file's `Type` string and resistor count.
    pub fn resolve(kind: &str, resistor_count: usize) -> Result<Self, AppError> {
        match (kind.trim().to_lowercase().as_str(), resistor_count) {
            ("passive", 1) => Ok(FilterKind::PassiveLag),
            ("passive", 2) => Ok(FilterKind::PassiveLagLead),
            ("active", 2) => Ok(FilterKind::ActivePi),
            ("passive", n) => Err(AppError::input(format!(
                "Passive loop filter needs 1 or 2 resistors, got {n}."
            ))),
            ("active", n) => Err(AppError::input(format!(
                "Active loop filter needs 2 resistors, got {n}."
            ))),
            _ => Err(AppError::input(format!(
                "Filter type '{kind}' is not implemented."
            ))),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            FilterKind::PassiveLag => "passive lag",
            FilterKind::PassiveLagLead => "passive lag-lead",
            FilterKind::ActivePi => "active PI",
        }
    }

    /// Number of resistors in this topology.
    pub fn resistor_count(self) -> usize {
        match self {
            FilterKind::PassiveLag => 1,
            FilterKind::PassiveLagLead | FilterKind::ActivePi => 2,
        }
    }
}

impl Parameters {
    /// Check that every gain and component value is usable.
    pub fn validate(&self) -> Result<FilterKind, AppError> {
        let s = &self.s_parameters;
        for (name, value) in [("k_vco", s.k_vco), ("k_pd", s.k_pd), ("k_n", s.k_n)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(AppError::input(format!(
                    "S Parameters: {name} must be finite and > 0, got {value}."
                )));
            }
        }

        let filter = &self.loop_filter;
        let kind = FilterKind::resolve(&filter.kind, filter.r.len())?;
        if filter.c.len() != 1 {
            return Err(AppError::input(format!(
                "Loop Filter: expected exactly 1 capacitor, got {}.",
                filter.c.len()
            )));
        }
        for (i, &r) in filter.r.iter().enumerate() {
            if !(r.is_finite() && r > 0.0) {
                return Err(AppError::input(format!(
                    "Loop Filter: R[{i}] must be finite and > 0, got {r}."
                )));
            }
        }
        let c = filter.c[0];
        if !(c.is_finite() && c > 0.0) {
            return Err(AppError::input(format!(
                "Loop Filter: C[0] must be finite and > 0, got {c}."
            )));
        }

        Ok(kind)
    }
}

/// One closed-loop pole and its derived figures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoleInfo {
    pub pole: Complex<f64>,
    /// [Hz]
    pub natural_frequency: f64,
    /// [-]
    pub damping_factor: f64,
}

/// Closed-form second-order characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondOrder {
    /// [Hz]
    pub natural_frequency: f64,
    /// [-]
    pub damping_factor: f64,
}

/// Open-loop stability margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    /// Unity-gain crossover of the open loop [Hz].
    pub crossover_frequency: f64,
    /// [deg]
    pub phase_margin: f64,
}

/// Outcome of a design run, as stored in an exported parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecord {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub filter: FilterKind,
    pub target: SecondOrder,
    /// Resistors straight from the fit [Ohm].
    pub fitted_r: Vec<f64>,
    pub fitted: SecondOrder,
    pub series: ESeries,
    /// Resistors rounded to the preferred series [Ohm].
    pub standard_r: Vec<f64>,
    pub standard: SecondOrder,
}

/// A parameter file with the designed resistors and a `Design Result` record.
///
/// The flattened parameters keep the export loadable as a regular parameter file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignFile {
    #[serde(flatten)]
    pub parameters: Parameters,
    #[serde(rename = "Design Result")]
    pub result: DesignRecord,
}
