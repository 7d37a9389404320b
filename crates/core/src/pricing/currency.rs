use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// INR per USD used when no rate is configured.
pub fn default_usd_rate() -> Decimal {
    Decimal::new(835, 1)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UsdConverter {
    inr_per_usd: Decimal,
}

impl Default for UsdConverter {
    fn default() -> Self {
        Self { inr_per_usd: default_usd_rate() }
    }
}

impl UsdConverter {
    /// Returns `None` unless the rate is strictly positive.
    pub fn new(inr_per_usd: Decimal) -> Option<Self> {
        (inr_per_usd > Decimal::ZERO).then_some(Self { inr_per_usd })
    }

    pub fn rate(&self) -> Decimal {
        self.inr_per_usd
    }

    /// INR to USD, rounded half-away-from-zero to cents.
    pub fn to_usd(&self, inr: i64) -> Decimal {
        (Decimal::from(inr) / self.inr_per_usd)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn to_usd_f64(&self, inr: i64) -> f64 {
        self.to_usd(inr).to_f64().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::UsdConverter;

    #[test]
    fn converts_at_default_rate() {
        let converter = UsdConverter::default();

        assert_eq!(converter.to_usd(835), Decimal::new(1000, 2));
        assert_eq!(converter.to_usd(119_900), Decimal::new(143_593, 2));
        assert_eq!(converter.to_usd_f64(0), 0.0);
    }

    #[test]
    fn custom_rate_is_applied() {
        let converter = UsdConverter::new(Decimal::new(83, 0)).expect("positive rate");

        assert_eq!(converter.to_usd(8_300), Decimal::new(10_000, 2));
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        assert!(UsdConverter::new(Decimal::ZERO).is_none());
        assert!(UsdConverter::new(Decimal::new(-1, 0)).is_none());
    }
}
