//! Input/output helpers.
//!
//! - parameter JSON read/write (`params`)
//! - VCO measurement CSV ingest + gain extraction (`vco`)
//! - step response CSV export (`export`)

pub mod export;
pub mod params;
pub mod vco;

pub use export::*;
pub use params::*;
pub use vco::*;
