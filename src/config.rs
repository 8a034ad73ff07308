//! Service configuration.
//!
//! # Environment variables
//!
//! ## Required
//! - `DATABASE_URL` - PostgreSQL connection string
//! - `PUBLIC_BASE_URL` - public storefront url, used for payment redirects
//!   and absolute image links
//! - `PAYMENT_SECRET_KEY` - card processor API key
//! - `PAYMENT_WEBHOOK_SECRET` - shared secret for webhook signatures
//! - `CONTACT_INBOX` - address that receives contact-form messages
//!
//! ## Optional
//! - `HOST` (default `0.0.0.0`), `PORT` (default `8080`)
//! - `PAYMENT_API_BASE` (default `https://api.stripe.com`)
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` - all four
//!   enable email delivery; otherwise confirmations are only logged
//! - `STORE_CONFIG_PATH` - JSON file with rates, price overrides, promo
//!   codes and shipping policy

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::application::checkout::Storefront;
use crate::domain::catalog::Catalog;
use crate::domain::country::CountryCode;
use crate::domain::money::CurrencyCode;
use crate::domain::pricing::{PricingEngine, PromoTable};
use crate::domain::shipping::{ShippingMethod, ShippingPolicy, ShippingResolver};
use crate::infrastructure::mailer::SmtpSettings;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Cannot read store config {0}: {1}")]
    Unreadable(String, String),
    #[error("Invalid store config: {0}")]
    InvalidStore(String),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: SecretString,
    pub host: String,
    pub port: u16,
    pub public_base_url: String,
    pub payment_api_base: String,
    pub payment_secret_key: SecretString,
    pub payment_webhook_secret: SecretString,
    pub smtp: Option<SmtpSettings>,
    pub contact_inbox: String,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let port = get_env_or_default("PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("PORT".to_string(), e.to_string()))?;

        let store = match get_optional_env("STORE_CONFIG_PATH") {
            Some(path) => StoreConfig::from_file(Path::new(&path))?,
            None => StoreConfig::default(),
        };
        store.validate()?;

        Ok(Self {
            database_url: get_required_secret("DATABASE_URL")?,
            host: get_env_or_default("HOST", "0.0.0.0"),
            port,
            public_base_url: get_required_env("PUBLIC_BASE_URL")?,
            payment_api_base: get_env_or_default("PAYMENT_API_BASE", "https://api.stripe.com"),
            payment_secret_key: get_required_secret("PAYMENT_SECRET_KEY")?,
            payment_webhook_secret: get_required_secret("PAYMENT_WEBHOOK_SECRET")?,
            smtp: smtp_from_env(),
            contact_inbox: get_required_env("CONTACT_INBOX")?,
            store,
        })
    }
}

fn smtp_from_env() -> Option<SmtpSettings> {
    Some(SmtpSettings {
        host: get_optional_env("SMTP_HOST")?,
        username: get_optional_env("SMTP_USERNAME")?,
        password: SecretString::from(get_optional_env("SMTP_PASSWORD")?),
        from_address: get_optional_env("EMAIL_FROM")?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ShippingTier {
    pub name: String,
    pub cost_minor: i64,
}

impl ShippingTier {
    fn new(name: &str, cost_minor: i64) -> Self {
        Self {
            name: name.to_string(),
            cost_minor,
        }
    }

    fn method(&self, tracked: bool) -> ShippingMethod {
        ShippingMethod {
            name: self.name.clone(),
            base_cost_minor: self.cost_minor,
            tracked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShippingConfig {
    pub home_country: String,
    pub domestic_tracked: ShippingTier,
    pub domestic_untracked: ShippingTier,
    pub international_tracked: ShippingTier,
    pub untracked_default: bool,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            home_country: "CA".to_string(),
            domestic_tracked: ShippingTier::new("Tracked Canada", 600),
            domestic_untracked: ShippingTier::new("Untracked Canada", 200),
            international_tracked: ShippingTier::new("Tracked International", 900),
            untracked_default: false,
        }
    }
}

/// Merchant-editable store tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Decimal strings, one per currency; missing currencies use built-in rates.
    pub rates: BTreeMap<CurrencyCode, String>,
    /// Base price (minor units) → currency → list price (minor units).
    pub price_overrides: BTreeMap<i64, BTreeMap<CurrencyCode, i64>>,
    /// Code → percent off.
    pub promo_codes: BTreeMap<String, u8>,
    pub shipping: ShippingConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        use CurrencyCode::*;

        let rates = CurrencyCode::ALL
            .iter()
            .map(|c| (*c, c.default_rate().to_string()))
            .collect();

        let table: [(i64, [i64; 9]); 3] = [
            (2599, [3499, 2599, 1899, 2199, 3999, 4199, 3999, 2299, 24900]),
            (2199, [2999, 2199, 1699, 1899, 3499, 3699, 3399, 1999, 21900]),
            (3200, [4000, 3200, 2600, 2900, 4300, 4500, 4400, 2800, 30000]),
        ];
        let order = [Cad, Usd, Gbp, Eur, Aud, Nzd, Jpy, Chf, Sek];
        let price_overrides = table
            .into_iter()
            .map(|(base, prices)| (base, order.into_iter().zip(prices).collect()))
            .collect();

        let mut promo_codes = BTreeMap::new();
        promo_codes.insert("WELCOME10".to_string(), 10);

        Self {
            rates,
            price_overrides,
            promo_codes,
            shipping: ShippingConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(display.clone(), e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::Unreadable(display, e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_rates()?;

        for (base, row) in &self.price_overrides {
            if *base < 0 || row.values().any(|v| *v < 0) {
                return Err(invalid(format!("negative price override for base {base}")));
            }
        }

        let mut seen = BTreeSet::new();
        for (code, pct) in &self.promo_codes {
            let canonical = code.trim().to_ascii_uppercase();
            if canonical.is_empty() {
                return Err(invalid("empty promo code".to_string()));
            }
            if !(1..=100).contains(pct) {
                return Err(invalid(format!("promo {code} has percent {pct}")));
            }
            if !seen.insert(canonical) {
                return Err(invalid(format!("promo {code} is defined twice")));
            }
        }

        let s = &self.shipping;
        CountryCode::resolve(&s.home_country)
            .map_err(|_| invalid(format!("unknown home country {}", s.home_country)))?;
        for tier in [&s.domestic_tracked, &s.domestic_untracked, &s.international_tracked] {
            if tier.cost_minor < 0 {
                return Err(invalid(format!("shipping tier {} costs less than zero", tier.name)));
            }
            if tier.name.trim().is_empty() {
                return Err(invalid("unnamed shipping tier".to_string()));
            }
        }
        Ok(())
    }

    /// Validates, then assembles the pricing collaborators.
    pub fn build(&self) -> Result<Storefront, ConfigError> {
        self.validate()?;
        let s = &self.shipping;
        let home_country = CountryCode::resolve(&s.home_country)
            .map_err(|_| invalid(format!("unknown home country {}", s.home_country)))?;

        Ok(Storefront {
            catalog: Arc::new(Catalog::default()),
            pricing: Arc::new(PricingEngine::new(
                self.parsed_rates()?,
                self.price_overrides.clone(),
            )),
            shipping: Arc::new(ShippingResolver::new(ShippingPolicy {
                home_country,
                domestic_tracked: s.domestic_tracked.method(true),
                domestic_untracked: s.domestic_untracked.method(false),
                international_tracked: s.international_tracked.method(true),
                untracked_default: s.untracked_default,
            })),
            promos: Arc::new(PromoTable::new(
                self.promo_codes.iter().map(|(c, p)| (c.clone(), *p)),
            )),
        })
    }

    fn parsed_rates(&self) -> Result<BTreeMap<CurrencyCode, BigDecimal>, ConfigError> {
        self.rates
            .iter()
            .map(|(currency, raw)| {
                let rate: BigDecimal = raw
                    .trim()
                    .parse()
                    .map_err(|_| invalid(format!("rate for {currency} is not a number: {raw}")))?;
                if rate <= BigDecimal::zero() {
                    return Err(invalid(format!("rate for {currency} must be positive")));
                }
                Ok((*currency, rate))
            })
            .collect()
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::InvalidStore(message)
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    get_required_env(key).map(SecretString::from)
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
