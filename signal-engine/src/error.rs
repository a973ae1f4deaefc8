//! Engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Not enough values for the requested indicator
    #[error("insufficient data: need {needed} values, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("invalid indicator parameter: {0}")]
    InvalidParameter(String),

    /// Data needed for this evaluation cycle is missing
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("unsupported interval '{0}'")]
    UnsupportedInterval(String),

    /// REST / WebSocket failure at a port
    #[error("network error: {0}")]
    Network(#[source] anyhow::Error),

    /// An active signal already exists for the scope
    #[error("active signal already exists for {0}")]
    InvariantViolation(String),

    #[error("notification failed: {0}")]
    Notification(#[source] anyhow::Error),

    #[error("persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl EngineError {
    /// Skippable conditions that are not worth more than a debug line
    pub fn is_data_gap(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientData { .. } | EngineError::DataUnavailable(_)
        )
    }
}
