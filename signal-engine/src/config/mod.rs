//! Configuration module

pub mod interval;
pub mod settings;

pub use interval::*;
pub use settings::*;
