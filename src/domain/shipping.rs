use serde::Serialize;
use utoipa::ToSchema;

use super::cart::Cart;
use super::country::CountryCode;

/// A shipping tier with its cost in the merchant's reference currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShippingMethod {
    pub name: String,
    pub base_cost_minor: i64,
    pub tracked: bool,
}

#[derive(Debug, Clone)]
pub struct ShippingPolicy {
    pub home_country: CountryCode,
    pub domestic_tracked: ShippingMethod,
    pub domestic_untracked: ShippingMethod,
    pub international_tracked: ShippingMethod,
    /// Offer the untracked tier first when both domestic tiers apply.
    pub untracked_default: bool,
}

/// Resolved tiers, default first. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingOptions {
    methods: Vec<ShippingMethod>,
}

impl ShippingOptions {
    fn new(first: ShippingMethod, rest: Vec<ShippingMethod>) -> Self {
        let mut methods = Vec::with_capacity(rest.len() + 1);
        methods.push(first);
        methods.extend(rest);
        Self { methods }
    }

    pub fn methods(&self) -> &[ShippingMethod] {
        &self.methods
    }

    pub fn default_method(&self) -> &ShippingMethod {
        // Constructed non-empty.
        &self.methods[0]
    }

    /// Keeps `previous` when it is still offered, otherwise falls back to
    /// the default tier.
    pub fn select(&self, previous: Option<&str>) -> &ShippingMethod {
        previous
            .and_then(|name| self.methods.iter().find(|m| m.name == name))
            .unwrap_or_else(|| self.default_method())
    }
}

#[derive(Debug, Clone)]
pub struct ShippingResolver {
    policy: ShippingPolicy,
}

impl ShippingResolver {
    pub fn new(policy: ShippingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ShippingPolicy {
        &self.policy
    }

    /// Domestic single-unit carts may ship untracked. Anything larger is
    /// forced onto the tracked tier as a loss-prevention rule, and every
    /// foreign destination gets the tracked international tier.
    pub fn resolve(&self, destination: CountryCode, cart: &Cart) -> ShippingOptions {
        let p = &self.policy;
        if destination != p.home_country {
            return ShippingOptions::new(p.international_tracked.clone(), Vec::new());
        }
        if cart.total_quantity() > 1 {
            return ShippingOptions::new(p.domestic_tracked.clone(), Vec::new());
        }
        if p.untracked_default {
            ShippingOptions::new(p.domestic_untracked.clone(), vec![p.domestic_tracked.clone()])
        } else {
            ShippingOptions::new(p.domestic_tracked.clone(), vec![p.domestic_untracked.clone()])
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            home_country: CountryCode::CANADA,
            domestic_tracked: ShippingMethod {
                name: "Tracked Canada".to_string(),
                base_cost_minor: 600,
                tracked: true,
            },
            domestic_untracked: ShippingMethod {
                name: "Untracked Canada".to_string(),
                base_cost_minor: 200,
                tracked: false,
            },
            international_tracked: ShippingMethod {
                name: "Tracked International".to_string(),
                base_cost_minor: 900,
                tracked: true,
            },
            untracked_default: false,
        }
    }
}
