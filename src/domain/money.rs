use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::ValidationError;

/// Display currencies offered by the store. Every currency is priced in
/// two-decimal minor units, JPY included.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    Cad,
    Usd,
    Gbp,
    Eur,
    Aud,
    Nzd,
    Jpy,
    Chf,
    Sek,
}

impl CurrencyCode {
    pub const ALL: [CurrencyCode; 9] = [
        CurrencyCode::Cad,
        CurrencyCode::Usd,
        CurrencyCode::Gbp,
        CurrencyCode::Eur,
        CurrencyCode::Aud,
        CurrencyCode::Nzd,
        CurrencyCode::Jpy,
        CurrencyCode::Chf,
        CurrencyCode::Sek,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CurrencyCode::Cad => "CAD",
            CurrencyCode::Usd => "USD",
            CurrencyCode::Gbp => "GBP",
            CurrencyCode::Eur => "EUR",
            CurrencyCode::Aud => "AUD",
            CurrencyCode::Nzd => "NZD",
            CurrencyCode::Jpy => "JPY",
            CurrencyCode::Chf => "CHF",
            CurrencyCode::Sek => "SEK",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CurrencyCode::Cad | CurrencyCode::Usd | CurrencyCode::Aud | CurrencyCode::Nzd => "$",
            CurrencyCode::Gbp => "£",
            CurrencyCode::Eur => "€",
            CurrencyCode::Jpy => "¥",
            CurrencyCode::Chf => "₣",
            CurrencyCode::Sek => "kr",
        }
    }

    /// Exchange rate against the merchant's base prices, used when the
    /// configuration does not supply one.
    pub fn default_rate(self) -> &'static str {
        match self {
            CurrencyCode::Cad => "1.35",
            CurrencyCode::Usd => "1",
            CurrencyCode::Gbp => "0.78",
            CurrencyCode::Eur => "0.91",
            CurrencyCode::Aud => "1.5",
            CurrencyCode::Nzd => "1.6",
            CurrencyCode::Jpy => "110",
            CurrencyCode::Chf => "0.89",
            CurrencyCode::Sek => "10.7",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        CurrencyCode::ALL
            .into_iter()
            .find(|c| c.as_str() == upper)
            .ok_or(ValidationError::UnknownCurrency)
    }
}

/// An amount in minor units ("cents") of a specific currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: CurrencyCode,
}

impl Money {
    pub fn new(amount_minor: i64, currency: CurrencyCode) -> Self {
        Self {
            amount_minor,
            currency,
        }
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        Self::new(0, currency)
    }

    /// `19.99 USD` style rendering used in notification bodies.
    pub fn format_major(&self) -> String {
        let sign = if self.amount_minor < 0 { "-" } else { "" };
        let abs = self.amount_minor.unsigned_abs();
        format!("{sign}{}.{:02} {}", abs / 100, abs % 100, self.currency)
    }
}
