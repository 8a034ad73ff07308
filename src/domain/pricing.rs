//! Currency conversion and promo discounts.
//!
//! Conversion looks up the merchant's curated list prices first and only
//! derives a price from the exchange rate when no override exists. Display
//! totals multiply the converted unit price by quantity; converting a
//! pre-multiplied total can differ by a cent and must not be done.

use std::collections::BTreeMap;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

use super::errors::ValidationError;
use super::money::{CurrencyCode, Money};

#[derive(Debug, Clone)]
pub struct PricingEngine {
    rates: BTreeMap<CurrencyCode, BigDecimal>,
    overrides: BTreeMap<i64, BTreeMap<CurrencyCode, i64>>,
}

impl PricingEngine {
    /// Currencies missing from `rates` fall back to
    /// [`CurrencyCode::default_rate`].
    pub fn new(
        rates: BTreeMap<CurrencyCode, BigDecimal>,
        overrides: BTreeMap<i64, BTreeMap<CurrencyCode, i64>>,
    ) -> Self {
        Self { rates, overrides }
    }

    pub fn rate(&self, currency: CurrencyCode) -> BigDecimal {
        self.rates.get(&currency).cloned().unwrap_or_else(|| {
            currency
                .default_rate()
                .parse()
                .unwrap_or_else(|_| BigDecimal::from(1))
        })
    }

    /// Converts a base price in minor units into `target`, rounding half-up
    /// to the nearest minor unit.
    pub fn convert(&self, base_minor: i64, target: CurrencyCode) -> Money {
        if let Some(listed) = self
            .overrides
            .get(&base_minor)
            .and_then(|row| row.get(&target))
        {
            return Money::new(*listed, target);
        }
        let derived = (BigDecimal::from(base_minor) * self.rate(target))
            .with_scale_round(0, RoundingMode::HalfUp)
            .to_i64()
            .unwrap_or(i64::MAX);
        Money::new(derived, target)
    }

    /// Shipping is displayed in whole currency units: the converted cost
    /// with its minor-unit remainder dropped.
    pub fn convert_shipping(&self, base_minor: i64, target: CurrencyCode) -> Money {
        let converted = self.convert(base_minor, target).amount_minor;
        Money::new((converted / 100) * 100, target)
    }

    /// Converted unit price times quantity.
    pub fn line_total(&self, unit_base_minor: i64, quantity: u32, target: CurrencyCode) -> Money {
        let unit = self.convert(unit_base_minor, target);
        Money::new(unit.amount_minor * i64::from(quantity), target)
    }
}

/// Percentage-off promo codes, matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PromoTable {
    codes: BTreeMap<String, u8>,
}

impl PromoTable {
    pub fn new(codes: impl IntoIterator<Item = (String, u8)>) -> Self {
        Self {
            codes: codes
                .into_iter()
                .map(|(code, pct)| (code.trim().to_ascii_uppercase(), pct))
                .collect(),
        }
    }

    /// Returns the canonical code and its percentage.
    pub fn lookup(&self, code: &str) -> Result<(String, u8), ValidationError> {
        let key = code.trim().to_ascii_uppercase();
        self.codes
            .get(&key)
            .map(|pct| (key.clone(), *pct))
            .ok_or(ValidationError::UnknownPromo)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Percentage of an already converted subtotal, rounded half-up and never
/// larger than the subtotal itself.
pub fn discount_minor(subtotal_minor: i64, percent: u8) -> i64 {
    if subtotal_minor <= 0 {
        return 0;
    }
    let raw = (subtotal_minor * i64::from(percent) + 50) / 100;
    raw.clamp(0, subtotal_minor)
}
