pub mod signal_repository;
pub mod subscription_repository;

pub use signal_repository::SignalRepository;
pub use subscription_repository::SubscriptionRepository;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use signal_engine::prelude::EngineError;

pub(crate) fn persistence(e: sea_orm::DbErr) -> EngineError {
    EngineError::Persistence(e.into())
}

/// Non-finite values are stored as zero
pub(crate) fn to_decimal(value: f64, scale: u32) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(scale)
}

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_conversion() {
        assert_eq!(to_decimal(1.234567891234, 8).to_string(), "1.23456789");
        assert_eq!(to_decimal(f64::NAN, 4), Decimal::ZERO);
        assert_eq!(to_f64(to_decimal(2.5, 4)), 2.5);
    }
}
