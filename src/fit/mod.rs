//! Numerical fitting around the loop model.
//!
//! Responsibilities:
//!
//! - generate log-spaced search grids
//! - fit filter resistors to a natural frequency / damping target
//! - round fitted values to preferred-number series
//! - Monte Carlo spread under component tolerances

pub mod design;
pub mod eseries;
pub mod grid;
pub mod tolerance;

pub use design::*;
pub use tolerance::*;
