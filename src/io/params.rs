//! Read/write parameter JSON files.
//!
//! A parameter file describes one loop: gains, loop filter, and optional
//! design / VCO / tolerance sections. Design exports are parameter files too
//! (see `domain::DesignFile`), so they can be fed straight back into
//! `pll analyze`.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::{DesignFile, Parameters};
use crate::error::AppError;

/// Environment variable naming the default parameter file.
pub const PARAMS_ENV: &str = "PLL_PARAMS";
/// Fallback parameter file in the working directory.
pub const DEFAULT_PARAMS_FILE: &str = "parameters.json";

/// Pick the parameter file: CLI flag, then `PLL_PARAMS` (`.env` honoured),
/// then `parameters.json`.
pub fn resolve_params_path(cli: Option<&Path>) -> PathBuf {
    if let Some(path) = cli {
        return path.to_path_buf();
    }
    dotenvy::dotenv().ok();
    params_path_from_env()
}

/// `PLL_PARAMS` if set and non-empty, else `parameters.json`.
fn params_path_from_env() -> PathBuf {
    std::env::var_os(PARAMS_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PARAMS_FILE))
}

/// Read a parameter file.
pub fn read_parameters(path: &Path) -> Result<Parameters, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::input(format!("Failed to open parameter file '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file).map_err(|e| {
        AppError::input(format!("Invalid parameter file '{}': {e}", path.display()))
    })
}

/// Write a design export (parameters + `Design Result`).
pub fn write_design_file(path: &Path, design: &DesignFile) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::input(format!("Failed to create design file '{}': {e}", path.display()))
    })?;
    serde_json::to_writer_pretty(file, design)
        .map_err(|e| AppError::input(format!("Failed to write design file: {e}")))
}

/// Resolve a path referenced from inside a parameter file.
///
/// Relative paths are taken relative to the parameter file's directory.
pub fn resolve_relative(params_path: &Path, referenced: &Path) -> PathBuf {
    if referenced.is_absolute() {
        return referenced.to_path_buf();
    }
    match params_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(referenced),
        _ => referenced.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::domain::{DesignRecord, ESeries, FilterKind, LoopFilterSpec, SParameters, SecondOrder};

    fn sample() -> Parameters {
        Parameters {
            s_parameters: SParameters {
                k_vco: 1.0e5,
                k_pd: 0.4,
                k_n: 1.0,
            },
            loop_filter: LoopFilterSpec {
                kind: "passive".to_string(),
                r: vec![8.2e5, 4.3e3],
                c: vec![1e-6],
            },
            design: None,
            vco: None,
            tolerance: None,
        }
    }

    #[test]
    fn design_export_reads_back_as_parameters() {
        let so = SecondOrder {
            natural_frequency: 50.0,
            damping_factor: 0.7,
        };
        let design = DesignFile {
            parameters: sample(),
            result: DesignRecord {
                tool: "pll".to_string(),
                generated: Utc::now(),
                filter: FilterKind::PassiveLagLead,
                target: so,
                fitted_r: vec![8.06e5, 4.49e3],
                fitted: so,
                series: ESeries::E24,
                standard_r: vec![8.2e5, 4.3e3],
                standard: so,
            },
        };

        let path = std::env::temp_dir().join(format!("pll_design_{}.json", std::process::id()));
        write_design_file(&path, &design).unwrap();
        let params = read_parameters(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(params, sample());
        assert!(text.contains("\"Design Result\""));
        assert!(text.contains("\"Loop Filter\""));
    }

    // The only test touching `PLL_PARAMS`; every other test passes an explicit path.
    #[test]
    fn params_path_falls_back_from_flag_to_env_to_default() {
        let dir = std::env::temp_dir().join(format!("pll_env_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let env_file = dir.join(".env");
        std::fs::write(&env_file, format!("{PARAMS_ENV}=boards/from_dotenv.json\n")).unwrap();

        unsafe { std::env::remove_var(PARAMS_ENV) };
        assert_eq!(params_path_from_env(), PathBuf::from(DEFAULT_PARAMS_FILE));

        dotenvy::from_path(&env_file).unwrap();
        assert_eq!(resolve_params_path(None), PathBuf::from("boards/from_dotenv.json"));

        unsafe { std::env::set_var(PARAMS_ENV, "from_env.json") };
        assert_eq!(resolve_params_path(None), PathBuf::from("from_env.json"));
        assert_eq!(
            resolve_params_path(Some(Path::new("cli.json"))),
            PathBuf::from("cli.json")
        );

        unsafe { std::env::set_var(PARAMS_ENV, "") };
        assert_eq!(params_path_from_env(), PathBuf::from(DEFAULT_PARAMS_FILE));

        unsafe { std::env::remove_var(PARAMS_ENV) };
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = read_parameters(Path::new("/nonexistent/parameters.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn relative_references_follow_the_parameter_file() {
        let p = resolve_relative(Path::new("boards/a/parameters.json"), Path::new("vco.csv"));
        assert_eq!(p, PathBuf::from("boards/a/vco.csv"));
        let p = resolve_relative(Path::new("parameters.json"), Path::new("vco.csv"));
        assert_eq!(p, PathBuf::from("vco.csv"));
        assert_eq!(
            resolve_relative(Path::new("a/p.json"), Path::new("/abs/v.csv")),
            PathBuf::from("/abs/v.csv")
        );
    }

    #[test]
    fn cli_path_wins() {
        let p = resolve_params_path(Some(Path::new("x.json")));
        assert_eq!(p, PathBuf::from("x.json"));
    }
}
