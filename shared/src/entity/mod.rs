pub mod signals;
pub mod subscriptions;
