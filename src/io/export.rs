//! Export a simulated step response to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use crate::error::AppError;
use crate::sim::StepResponse;

/// Write `time,response` rows to a CSV file.
pub fn write_step_csv(path: &Path, step: &StepResponse) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::input(format!("Failed to create export CSV '{}': {e}", path.display()))
    })?;

    writer
        .write_record(["time_s", "response"])
        .map_err(|e| AppError::input(format!("Failed to write export CSV header: {e}")))?;

    for (t, y) in step.time.iter().zip(&step.response) {
        writer
            .write_record([format!("{t:.9e}"), format!("{y:.9}")])
            .map_err(|e| AppError::input(format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush export CSV: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let step = StepResponse {
            time: vec![0.0, 0.001],
            response: vec![0.0, 0.5],
        };
        let path = std::env::temp_dir().join(format!("pll_step_{}.csv", std::process::id()));
        write_step_csv(&path, &step).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time_s,response");
        assert_eq!(lines[2], "1.000000000e-3,0.500000000");
    }
}
