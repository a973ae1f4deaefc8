//! Strategy module
//!
//! Per-pair indicator state and the signal generator that reads it.

pub mod generator;
pub mod state;

pub use generator::*;
pub use state::*;
