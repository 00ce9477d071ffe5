//! `pll-loop` library crate.
//!
//! The binary (`pll`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the loop model and design search are reusable from other tools

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod sim;
