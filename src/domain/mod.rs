//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the parameter-file schema (`Parameters`, `SParameters`, `LoopFilterSpec`, ...)
//! - the resolved filter topology (`FilterKind`)
//! - analysis outputs (`PoleInfo`, `SecondOrder`, `Margins`, `DesignFile`)

pub mod types;

pub use types::*;
