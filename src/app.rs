//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the parameter file (and VCO measurements)
//! - runs the requested analysis
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use crossterm::tty::IsTty;

use crate::cli::{AnalyzeArgs, Cli, Command, DesignArgs, StepArgs, ToleranceArgs, VcoArgs};
use crate::error::AppError;
use crate::fit::ToleranceOptions;
use crate::sim::StepOptions;

pub mod pipeline;

/// Entry point for the `pll` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let ctx = Context {
        params: cli.params,
        color: !cli.no_color && std::io::stdout().is_tty(),
    };

    match cli.command {
        Command::Analyze(args) => handle_analyze(&ctx, args),
        Command::Design(args) => handle_design(&ctx, args),
        Command::Vco(args) => handle_vco(&ctx, args),
        Command::Step(args) => handle_step(&ctx, args),
        Command::Tolerance(args) => handle_tolerance(&ctx, args),
    }
}

/// Global options shared by every mode.
#[derive(Debug, Clone)]
struct Context {
    params: Option<std::path::PathBuf>,
    color: bool,
}

fn handle_analyze(ctx: &Context, args: AnalyzeArgs) -> Result<(), AppError> {
    let loaded = pipeline::load(ctx.params.as_deref(), &args.vco)?;
    let report = pipeline::analyze(&loaded)?;
    print!("{}", crate::report::format_analysis(&report, ctx.color));
    Ok(())
}

fn handle_design(ctx: &Context, args: DesignArgs) -> Result<(), AppError> {
    let loaded = pipeline::load(ctx.params.as_deref(), &args.vco)?;
    let request = pipeline::design_request(
        &loaded.params,
        pipeline::DesignRequest {
            natural_frequency: args.natural_frequency,
            damping_factor: args.damping_factor,
            r_min: args.r_min,
            r_max: args.r_max,
            series: args.series,
            grid_steps: args.grid_steps,
        },
    );
    let out = pipeline::design(&loaded, &request)?;
    print!("{}", crate::report::format_design(&out.report, ctx.color));

    if let Some(path) = &args.export {
        crate::io::write_design_file(path, &out.export)?;
        println!("Design written to {}", path.display());
    }
    Ok(())
}

fn handle_vco(ctx: &Context, args: VcoArgs) -> Result<(), AppError> {
    // Without an explicit CSV, fall back to the parameter file's VCO section.
    let (csv, v_min, v_max) = match args.csv {
        Some(csv) => (csv, args.v_min, args.v_max),
        None => {
            let path = crate::io::resolve_params_path(ctx.params.as_deref());
            let params = crate::io::read_parameters(&path)?;
            let spec = params.vco.ok_or_else(|| {
                AppError::input(format!(
                    "No VCO measurements: pass a CSV or add a VCO section to '{}'.",
                    path.display()
                ))
            })?;
            (
                crate::io::resolve_relative(&path, &spec.measurements),
                args.v_min.or(spec.v_min),
                args.v_max.or(spec.v_max),
            )
        }
    };

    let (data, fit) = crate::io::extract_vco_gain(&csv, v_min, v_max)?;
    print!("{}", crate::report::format_vco(&data, &fit, ctx.color));
    Ok(())
}

fn handle_step(ctx: &Context, args: StepArgs) -> Result<(), AppError> {
    let loaded = pipeline::load(ctx.params.as_deref(), &args.vco)?;
    let opts = StepOptions {
        duration: args.duration_ms.map(|ms| ms * 1e-3),
        samples: args.samples,
    };
    let (response, metrics) = pipeline::step(&loaded, &opts)?;

    print!("{}", crate::report::format_step_metrics(&metrics, ctx.color));
    if !args.no_plot {
        println!();
        print!(
            "{}",
            crate::plot::render_step_plot(&response, Some(metrics.final_value), args.width, args.height)
        );
    }

    if let Some(path) = &args.export {
        crate::io::write_step_csv(path, &response)?;
        println!("Step response written to {}", path.display());
    }
    if let Some(path) = &args.svg {
        crate::plot::write_step_svg(
            path,
            &response,
            Some(metrics.final_value),
            args.svg_width,
            args.svg_height,
        )?;
        println!("Chart written to {}", path.display());
    }
    Ok(())
}

fn handle_tolerance(ctx: &Context, args: ToleranceArgs) -> Result<(), AppError> {
    let loaded = pipeline::load(ctx.params.as_deref(), &args.vco)?;
    let mut tolerance = loaded.params.tolerance.unwrap_or_default();
    if let Some(r) = args.r_tol {
        tolerance.r = r;
    }
    if let Some(c) = args.c_tol {
        tolerance.c = c;
    }

    let report = pipeline::tolerance(
        &loaded,
        &ToleranceOptions {
            samples: args.samples,
            seed: args.seed,
            tolerance,
        },
    )?;
    print!("{}", crate::report::format_tolerance(&report, ctx.color));
    Ok(())
}
