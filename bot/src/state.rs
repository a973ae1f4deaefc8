use signal_engine::prelude::ServiceCommand;
use tokio::sync::mpsc;

use crate::repositories::{SignalRepository, SubscriptionRepository};

/// Shared by every command handler through `dptree::deps!`
pub struct AppState {
    pub bot_name: String,
    pub subscriptions: std::sync::Arc<SubscriptionRepository>,
    pub signals: std::sync::Arc<SignalRepository>,
    /// Wakes the signal service after subscription changes
    pub control: mpsc::Sender<ServiceCommand>,
}
