//! Terminal plot of a closed-loop step response.
//!
//! A fixed character grid: the response is drawn with `-`, the final value
//! with `.` wherever the response left the cell blank. The output is
//! deterministic, so tests compare it verbatim.

use crate::plot::svg::bounds;
use crate::sim::StepResponse;

const RESPONSE: char = '-';
const REFERENCE: char = '.';

/// Render `step` on a `width` x `height` grid, with an optional reference level.
pub fn render_step_plot(
    step: &StepResponse,
    reference: Option<f64>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (t0, t1) = bounds(step.time.iter().copied()).unwrap_or((0.0, 1.0));
    let (y0, y1) = bounds(step.response.iter().copied().chain(reference)).unwrap_or((0.0, 1.0));
    let pad = ((y1 - y0) * 0.05).max(1e-12);
    let (y0, y1) = (y0 - pad, y1 + pad);

    let col = |t: f64| cell(t, t0, t1, width);
    let row = |y: f64| height - 1 - cell(y, y0, y1, height);

    let mut grid = vec![vec![' '; width]; height];
    let mut prev = None;
    for (&t, &y) in step.time.iter().zip(&step.response) {
        let here = (col(t), row(y));
        stroke(&mut grid, prev.unwrap_or(here), here, RESPONSE);
        prev = Some(here);
    }
    if let Some(level) = reference {
        let r = row(level);
        stroke(&mut grid, (0, r), (width - 1, r), REFERENCE);
    }

    let mut out = format!("Plot: t=[{t0:.4}, {t1:.4}] s | y=[{y0:.2}, {y1:.2}]\n");
    for line in grid {
        out.extend(line);
        out.push('\n');
    }
    out
}

/// Index of `v` on an `n`-cell axis spanning `[lo, hi]`.
fn cell(v: f64, lo: f64, hi: f64, n: usize) -> usize {
    let u = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
    (u * (n - 1) as f64).round() as usize
}

/// Bresenham segment between two `(col, row)` cells; paints blank cells only.
fn stroke(grid: &mut [Vec<char>], from: (usize, usize), to: (usize, usize), ch: char) {
    let (mut x, mut y) = (from.0 as isize, from.1 as isize);
    let (x1, y1) = (to.0 as isize, to.1 as isize);
    let (dx, dy) = ((x1 - x).abs(), -(y1 - y).abs());
    let (sx, sy) = ((x1 - x).signum(), (y1 - y).signum());
    let mut err = dx + dy;

    loop {
        if let Some(c) = grid.get_mut(y as usize).and_then(|r| r.get_mut(x as usize)) {
            if *c == ' ' {
                *c = ch;
            }
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}
