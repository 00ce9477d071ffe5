//! Command-line parsing for the 74HC4046 PLL loop tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ESeries;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pll", version, about = "Design and analysis tool for the 74HC4046 PLL loop")]
pub struct Cli {
    /// Parameter file (default: $PLL_PARAMS, then ./parameters.json).
    #[arg(short = 'p', long, global = true, value_name = "JSON")]
    pub params: Option<PathBuf>,

    /// Disable coloured section headers.
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Execution modes.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print loop poles with natural frequency and damping factor.
    Analyze(AnalyzeArgs),
    /// Fit loop filter resistors to a target natural frequency and damping factor.
    Design(DesignArgs),
    /// Extract the VCO gain from measured voltage/frequency data.
    Vco(VcoArgs),
    /// Simulate and plot the closed-loop step response.
    Step(StepArgs),
    /// Monte Carlo spread of natural frequency and damping under component tolerances.
    Tolerance(ToleranceArgs),
}

/// Replace `k_vco` with a value measured from a CSV.
#[derive(Debug, Args, Clone, Default)]
pub struct VcoOverride {
    /// VCO measurement CSV (columns `voltage`, `frequency`); overrides `k_vco`.
    #[arg(long, value_name = "CSV")]
    pub vco_csv: Option<PathBuf>,

    /// Lower end of the VCO fit window [V].
    #[arg(long)]
    pub vco_v_min: Option<f64>,

    /// Upper end of the VCO fit window [V].
    #[arg(long)]
    pub vco_v_max: Option<f64>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub vco: VcoOverride,
}

#[derive(Debug, Args, Clone)]
pub struct DesignArgs {
    /// Target natural frequency [Hz] (overrides `Design.natural_frequency`).
    #[arg(short = 'f', long)]
    pub natural_frequency: Option<f64>,

    /// Target damping factor (overrides `Design.damping_factor`).
    #[arg(short = 'z', long)]
    pub damping_factor: Option<f64>,

    /// Smallest resistor to consider [Ohm].
    #[arg(long)]
    pub r_min: Option<f64>,

    /// Largest resistor to consider [Ohm].
    #[arg(long)]
    pub r_max: Option<f64>,

    /// Preferred-value series for rounding the result.
    #[arg(long, value_enum)]
    pub series: Option<ESeries>,

    /// Grid points per resistor for the start-point search.
    #[arg(long, default_value_t = 61)]
    pub grid_steps: usize,

    /// Write a parameter file with the designed resistors.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    #[command(flatten)]
    pub vco: VcoOverride,
}

#[derive(Debug, Args, Clone)]
pub struct VcoArgs {
    /// Measurement CSV (default: `VCO.measurements` from the parameter file).
    #[arg(value_name = "CSV")]
    pub csv: Option<PathBuf>,

    /// Lower end of the fit window [V].
    #[arg(long)]
    pub v_min: Option<f64>,

    /// Upper end of the fit window [V].
    #[arg(long)]
    pub v_max: Option<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct StepArgs {
    /// Simulated time [ms] (default: ten time constants of the slowest pole).
    #[arg(long)]
    pub duration_ms: Option<f64>,

    /// Number of output samples.
    #[arg(long, default_value_t = 1000)]
    pub samples: usize,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the response to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Write the response as an SVG chart.
    #[arg(long, value_name = "SVG")]
    pub svg: Option<PathBuf>,

    /// SVG size in pixels.
    #[arg(long, default_value_t = 800)]
    pub svg_width: u32,

    #[arg(long, default_value_t = 480)]
    pub svg_height: u32,

    #[command(flatten)]
    pub vco: VcoOverride,
}

#[derive(Debug, Args, Clone)]
pub struct ToleranceArgs {
    /// Number of Monte Carlo samples.
    #[arg(short = 'n', long, default_value_t = 2000)]
    pub samples: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Resistor tolerance as a fraction (overrides `Tolerance.r`).
    #[arg(long)]
    pub r_tol: Option<f64>,

    /// Capacitor tolerance as a fraction (overrides `Tolerance.c`).
    #[arg(long)]
    pub c_tol: Option<f64>,

    #[command(flatten)]
    pub vco: VcoOverride,
}
