//! Stream module
//!
//! One serial worker per pair, and the manager that starts and stops them.

pub mod manager;
pub mod worker;

pub use manager::*;
pub use worker::*;
