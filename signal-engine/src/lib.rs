//! Signal Engine: MACD momentum signals confirmed across two timeframes
//!
//! This crate holds the algorithmic core of the signal bot:
//! - [ta-rs](https://github.com/greyblake/ta-rs) backed indicator functions (EMA, MACD, smoothed SMA)
//! - per-pair candle windows driven by one worker task per (symbol, interval)
//! - the signal generator (direction, momentum fading, volume, higher timeframe)
//! - the signal lifecycle (create, track excursion, resolve to success/failure)
//!
//! Everything that talks to the outside world (exchange, database, Telegram)
//! goes through the traits in [`ports`].
//!
//! # Features
//!
//! - **Data**: closed candles, pairs and market events
//! - **Indicators**: EMA, MACD, double-smoothed volume SMA
//! - **Strategy**: signal candidate generation per closed candle
//! - **Lifecycle**: at-most-one active signal per scope, take profit / expiry resolution
//! - **Streams**: reconciliation of desired pairs against live subscriptions
//!
//! # Example
//!
//! ```no_run
//! use signal_engine::prelude::*;
//! # async fn run(
//! #     source: std::sync::Arc<dyn MarketDataSource>,
//! #     subscriptions: std::sync::Arc<dyn SubscriptionStore>,
//! #     signals: std::sync::Arc<dyn SignalStore>,
//! #     notifier: std::sync::Arc<dyn Notifier>,
//! #     events: tokio::sync::mpsc::Receiver<MarketEvent>,
//! # ) -> Result<()> {
//! let (_control_tx, control_rx) = tokio::sync::mpsc::channel(16);
//! let service = SignalService::new(
//!     EngineSettings::default(),
//!     source,
//!     subscriptions,
//!     signals,
//!     notifier,
//! );
//! service.run(events, control_rx).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod lifecycle;
pub mod ports;
pub mod service;
pub mod stream;
pub mod strategy;

// Re-export commonly used types
pub mod prelude {
    pub use crate::config::*;
    pub use crate::data::*;
    pub use crate::error::*;
    pub use crate::lifecycle::*;
    pub use crate::ports::*;
    pub use crate::service::*;
    pub use crate::stream::*;
    pub use crate::strategy::*;

    pub use anyhow::{Context, Result};
}

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
