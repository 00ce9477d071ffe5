//! Linear models of the PLL.
//!
//! `transfer` is a generic rational transfer function; `loop_model` builds the
//! 74HC4046 loop from the parameter file on top of it.

pub mod loop_model;
pub mod transfer;

pub use loop_model::*;
pub use transfer::*;
