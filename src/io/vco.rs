//! VCO characteristic ingest and gain extraction.
//!
//! The input is a bench measurement of the 74HC4046 VCO: control voltage
//! against output frequency, one row per setting. We fit the straight line
//! `f = f0 + slope * V` and report `k_vco = 2*pi*slope` [rad/s/V].
//!
//! Design goals (same as any CSV ingest here):
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior**

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::error::AppError;
use crate::math::linear_fit;

const VOLTAGE_COLUMNS: [&str; 5] = ["voltage", "v", "vin", "v_in", "vc"];
const FREQUENCY_COLUMNS: [&str; 5] = ["frequency", "f", "freq", "fout", "f_out"];

/// One measured operating point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VcoSample {
    /// 1-based CSV line.
    pub line: usize,
    /// [V]
    pub voltage: f64,
    /// [Hz]
    pub frequency: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Ingest output: valid samples plus what was skipped.
#[derive(Debug, Clone)]
pub struct VcoData {
    pub samples: Vec<VcoSample>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Fitted VCO characteristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VcoFit {
    /// [rad/s/V]
    pub k_vco: f64,
    /// Frequency at 0 V, extrapolated [Hz].
    pub f0: f64,
    /// [Hz/V]
    pub slope: f64,
    pub r_squared: f64,
    /// [Hz]
    pub rms: f64,
    pub points_used: usize,
    /// Voltage span of the points used [V].
    pub v_range: (f64, f64),
}

/// Read a VCO measurement CSV.
pub fn load_vco_csv(path: &Path) -> Result<VcoData, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!("Failed to open VCO CSV '{}': {e}", path.display()))
    })?;
    read_vco_csv(file)
}

/// Read VCO measurements from any reader (file, in-memory buffer).
pub fn read_vco_csv<R: std::io::Read>(reader: R) -> Result<VcoData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read VCO CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let v_col = find_column(&header_map, &VOLTAGE_COLUMNS)
        .ok_or_else(|| AppError::input("Missing required column: `voltage`"))?;
    let f_col = find_column(&header_map, &FREQUENCY_COLUMNS)
        .ok_or_else(|| AppError::input("Missing required column: `frequency`"))?;

    let mut samples = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        rows_read += 1;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map_or(idx + 2, |p| p.line() as usize);
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        // Comment lines are skipped by the reader, so take the line from the record.
        let line = record.position().map_or(idx + 2, |p| p.line() as usize);

        match parse_row(&record, v_col, f_col) {
            Ok((voltage, frequency)) => samples.push(VcoSample {
                line,
                voltage,
                frequency,
            }),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    Ok(VcoData {
        samples,
        row_errors,
        rows_read,
    })
}

/// Fit the VCO line over the samples whose voltage lies in `[v_min, v_max]`.
pub fn fit_vco(data: &VcoData, v_min: Option<f64>, v_max: Option<f64>) -> Result<VcoFit, AppError> {
    let lo = v_min.unwrap_or(f64::NEG_INFINITY);
    let hi = v_max.unwrap_or(f64::INFINITY);
    if lo > hi {
        return Err(AppError::input(format!(
            "Invalid VCO voltage window: v_min={lo} > v_max={hi}."
        )));
    }

    let (v, f): (Vec<f64>, Vec<f64>) = data
        .samples
        .iter()
        .filter(|s| s.voltage >= lo && s.voltage <= hi)
        .map(|s| (s.voltage, s.frequency))
        .unzip();

    if v.len() < 2 {
        return Err(AppError::data(format!(
            "VCO fit needs at least 2 samples inside the voltage window, got {}.",
            v.len()
        )));
    }

    let line = linear_fit(&v, &f)?;
    let v_range = v.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), &x| {
        (a.min(x), b.max(x))
    });

    Ok(VcoFit {
        k_vco: 2.0 * PI * line.slope,
        f0: line.intercept,
        slope: line.slope,
        r_squared: line.r_squared,
        rms: line.rms,
        points_used: line.n,
        v_range,
    })
}

/// Load `path` and fit it in one go.
pub fn extract_vco_gain(
    path: &Path,
    v_min: Option<f64>,
    v_max: Option<f64>,
) -> Result<(VcoData, VcoFit), AppError> {
    let data = load_vco_csv(path)?;
    let fit = fit_vco(&data, v_min, v_max)?;
    if !(fit.k_vco.is_finite() && fit.k_vco > 0.0) {
        return Err(AppError::data(format!(
            "VCO gain must be positive; measured slope is {:.3} Hz/V.",
            fit.slope
        )));
    }
    Ok((data, fit))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel may prefix the first header with a BOM; lab exports often append
    // units, e.g. "Voltage [V]" or "freq (Hz)".
    let name = name.trim().trim_start_matches('\u{feff}');
    let name = name.split(['[', '(']).next().unwrap_or(name);
    name.trim().to_ascii_lowercase().replace(' ', "_")
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header_map.get(*n).copied())
}

fn parse_row(record: &StringRecord, v_col: usize, f_col: usize) -> Result<(f64, f64), String> {
    let voltage = parse_f64(record.get(v_col), "voltage")?;
    let frequency = parse_f64(record.get(f_col), "frequency")?;
    if frequency < 0.0 {
        return Err(format!("Negative frequency {frequency}."));
    }
    Ok((voltage, frequency))
}

fn parse_f64(raw: Option<&str>, column: &str) -> Result<f64, String> {
    let raw = raw
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing `{column}` value."))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("Invalid `{column}` value '{raw}'."))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("Non-finite `{column}` value."))
    }
}
