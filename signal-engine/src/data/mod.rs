//! Data management module
//!
//! Closed candles, pair keys and market events.

pub mod candle;

pub use candle::*;
