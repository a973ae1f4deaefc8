pub mod bybit;
pub mod messages;
pub mod telegram_notifier;

pub use bybit::{BybitMarketData, BybitStream};
pub use telegram_notifier::TelegramNotifier;
