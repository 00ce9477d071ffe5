//! Reporting: result bundles and formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use std::path::PathBuf;

use crossterm::style::Stylize;
use nalgebra::Complex;

use crate::domain::{ESeries, Margins, PoleInfo, SParameters, SecondOrder};
use crate::fit::DesignFit;
use crate::io::VcoFit;
use crate::models::LoopModel;

pub mod format;

pub use format::*;

/// Everything `pll analyze` prints.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub params_path: PathBuf,
    pub s_parameters: SParameters,
    pub model: LoopModel,
    /// [Ohm]
    pub resistors: Vec<f64>,
    /// [F]
    pub capacitor: f64,
    pub poles: Vec<PoleInfo>,
    /// Closed-loop zeros [1/s].
    pub zeros: Vec<Complex<f64>>,
    pub second_order: SecondOrder,
    pub margins: Option<Margins>,
    /// Present when `k_vco` came from VCO measurements.
    pub vco: Option<VcoFit>,
}

/// Everything `pll design` prints.
#[derive(Debug, Clone)]
pub struct DesignReport {
    pub fit: DesignFit,
    /// [F]
    pub capacitor: f64,
    pub series: ESeries,
    /// Fitted resistors rounded to `series` [Ohm].
    pub standard_r: Vec<f64>,
    pub standard: SecondOrder,
    /// Exact solution, when the topology can reach the target.
    pub closed_form: Option<Vec<f64>>,
    pub vco: Option<VcoFit>,
}

/// Banner styles for section headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
    Title,
    Section,
    Warning,
}

/// Render a header line, coloured when `color` is set.
pub fn banner(text: &str, kind: Banner, color: bool) -> String {
    if !color {
        return match kind {
            Banner::Title => format!("=== {text} ==="),
            Banner::Section => format!("--- {text} ---"),
            Banner::Warning => format!("!!! {text}"),
        };
    }
    match kind {
        Banner::Title => format!("{}", text.black().on_green().bold()),
        Banner::Section => format!("{}", text.white().on_blue().bold()),
        Banner::Warning => format!("{}", text.black().on_yellow().bold()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_banners_have_no_escape_codes() {
        let s = banner("Pole: 0", Banner::Section, false);
        assert_eq!(s, "--- Pole: 0 ---");
        assert!(!s.contains('\u{1b}'));
    }

    #[test]
    fn coloured_banners_keep_the_text() {
        let s = banner("Analyzing PLL Loop", Banner::Title, true);
        assert!(s.contains("Analyzing PLL Loop"));
        assert!(s.contains('\u{1b}'));
    }
}
