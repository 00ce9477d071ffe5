//! Step-response chart as an SVG file (Plotters).
//!
//! The chart carries no text: without Plotters' font features, label and
//! caption rendering is unavailable, and the terminal report already prints
//! every number. Lines drawn:
//! - response (blue)
//! - final value (grey)
//! - zero level (light grey)

use std::path::Path;

use plotters::prelude::*;

use crate::error::AppError;
use crate::sim::StepResponse;

const REFERENCE_GREY: RGBColor = RGBColor(150, 150, 150);
const AXIS_GREY: RGBColor = RGBColor(220, 220, 220);

/// Write `step` to `path` as a `width` x `height` SVG.
pub fn write_step_svg(
    path: &Path,
    step: &StepResponse,
    reference: Option<f64>,
    width: u32,
    height: u32,
) -> Result<(), AppError> {
    let draw_err = |e: &dyn std::fmt::Display| {
        AppError::input(format!("Failed to draw SVG '{}': {e}", path.display()))
    };

    let (x0, x1) = bounds(step.time.iter().copied()).unwrap_or((0.0, 1.0));
    let (y0, y1) = bounds(step.response.iter().copied().chain(reference).chain([0.0]))
        .unwrap_or((0.0, 1.0));
    let pad = (y1 - y0) * 0.05;
    let (y0, y1) = (y0 - pad, y1 + pad);

    let root = SVGBackend::new(path, (width.max(64), height.max(64))).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_err(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(16)
        .build_cartesian_2d(x0..x1, y0..y1)
        .map_err(|e| draw_err(&e))?;

    chart
        .draw_series(LineSeries::new([(x0, 0.0), (x1, 0.0)], &AXIS_GREY))
        .map_err(|e| draw_err(&e))?;
    if let Some(level) = reference {
        chart
            .draw_series(LineSeries::new([(x0, level), (x1, level)], &REFERENCE_GREY))
            .map_err(|e| draw_err(&e))?;
    }
    chart
        .draw_series(LineSeries::new(
            step.time.iter().copied().zip(step.response.iter().copied()),
            BLUE.stroke_width(2),
        ))
        .map_err(|e| draw_err(&e))?;

    root.present().map_err(|e| draw_err(&e))?;
    Ok(())
}

pub(crate) fn bounds(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    (lo.is_finite() && hi.is_finite() && hi > lo).then_some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_an_svg_document() {
        let step = StepResponse {
            time: vec![0.0, 0.5, 1.0],
            response: vec![0.0, 1.2, 1.0],
        };
        let path = std::env::temp_dir().join(format!("pll_step_{}.svg", std::process::id()));
        write_step_svg(&path, &step, Some(1.0), 320, 200).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(text.contains("<svg"));
        assert!(text.contains("polyline") || text.contains("path"));
    }

    #[test]
    fn bounds_need_a_span() {
        assert_eq!(bounds([1.0, 3.0, 2.0].into_iter()), Some((1.0, 3.0)));
        assert_eq!(bounds([2.0, 2.0].into_iter()), None);
    }
}
