//! Signal lifecycle module
//!
//! Signals move `active -> success | failure` exactly once.

pub mod manager;
pub mod signal;

pub use manager::*;
pub use signal::*;
