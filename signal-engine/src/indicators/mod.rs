//! Technical indicators module
//!
//! Pure functions over price/volume series, built on the `ta` crate's
//! moving averages. Every function takes the series ordered oldest first.

pub mod ema;
pub mod macd;
pub mod sma;

pub use ema::*;
pub use macd::*;
pub use sma::*;
