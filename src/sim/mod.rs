//! Time-domain simulation of the linear loop.

pub mod step;

pub use step::*;
