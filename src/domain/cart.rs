use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::ValidationError;

/// Upper bound for a personalization brief, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Most units a single cart entry can hold. Adds past it are rejected;
/// merges and explicit quantity updates clamp to it.
pub const MAX_LINE_QUANTITY: u32 = 999;

/// Trims free text and folds blank input to `None`, so that an empty string
/// and an absent value compare equal inside an identity key.
pub fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Who a durable cart belongs to: a shopper's device before sign-in, or
/// their account afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CartIdentity {
    Device(String),
    Account(String),
}

impl CartIdentity {
    /// Width of the `carts.identity` column.
    pub const MAX_STORAGE_KEY_CHARS: usize = 255;

    pub fn storage_key(&self) -> String {
        match self {
            CartIdentity::Device(token) => format!("device:{token}"),
            CartIdentity::Account(id) => format!("account:{id}"),
        }
    }

    /// False when the record could never be written.
    pub fn fits_storage(&self) -> bool {
        self.storage_key().chars().count() <= Self::MAX_STORAGE_KEY_CHARS
    }
}

/// Identity of a cart entry: `(product_id, size, description)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct LineKey {
    pub product_id: String,
    pub size: Option<String>,
    pub description: Option<String>,
}

impl LineKey {
    pub fn new(product_id: &str, size: Option<&str>, description: Option<&str>) -> Self {
        Self {
            product_id: product_id.trim().to_string(),
            size: normalize_text(size),
            description: normalize_text(description),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartLineItem {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub quantity: u32,
    /// Base price captured when the item was added.
    pub unit_price_minor: i64,
}

impl CartLineItem {
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id.clone(),
            size: self.size.clone(),
            description: self.description.clone(),
        }
    }

    pub fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id
            && self.size == key.size
            && self.description == key.description
    }

    /// Personalized items carry a customization brief.
    pub fn is_personalized(&self) -> bool {
        self.description.is_some()
    }

    fn normalized(mut self) -> Self {
        self.quantity = self.quantity.min(MAX_LINE_QUANTITY);
        self.size = normalize_text(self.size.as_deref());
        self.description = normalize_text(self.description.as_deref());
        self
    }
}

/// Partial update addressed by [`LineKey`]. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CartItemUpdate {
    pub quantity: Option<u32>,
    /// `Some("")` clears the size.
    pub size: Option<String>,
    /// `Some("")` clears the description.
    pub description: Option<String>,
}

/// Immutable cart snapshot. Every operation returns a new value.
///
/// `add` never produces two entries with the same key. Entries that arrive
/// through a sign-in merge may share a key (personalized items are never
/// folded together), so key-addressed operations apply to every matching
/// entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Cart {
    pub items: Vec<CartLineItem>,
    pub promo_code: Option<String>,
}

impl Cart {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a cart from persisted items, normalizing text fields and
    /// dropping zero-quantity rows.
    pub fn from_items(items: Vec<CartLineItem>) -> Self {
        Self {
            items: items
                .into_iter()
                .filter(|i| i.quantity > 0)
                .map(CartLineItem::normalized)
                .collect(),
            promo_code: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |total, i| total.saturating_add(i.quantity))
    }

    pub fn base_subtotal_minor(&self) -> i64 {
        self.items
            .iter()
            .map(|i| i.unit_price_minor * i64::from(i.quantity))
            .sum()
    }

    pub fn added(&self, item: CartLineItem) -> Result<Cart, ValidationError> {
        if item.quantity == 0 || item.quantity > MAX_LINE_QUANTITY {
            return Err(ValidationError::InvalidQuantity);
        }
        let item = item.normalized();
        if item
            .description
            .as_deref()
            .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS)
        {
            return Err(ValidationError::DescriptionTooLong);
        }

        let key = item.key();
        let mut items = self.items.clone();
        match items.iter_mut().find(|i| i.matches(&key)) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .filter(|q| *q <= MAX_LINE_QUANTITY)
                    .ok_or(ValidationError::InvalidQuantity)?;
            }
            None => items.push(item),
        }
        Ok(self.with_items(items))
    }

    /// Quantities below one are ignored; removal is the only way to zero.
    pub fn with_quantity(&self, key: &LineKey, quantity: u32) -> Cart {
        if quantity < 1 {
            return self.clone();
        }
        let quantity = quantity.min(MAX_LINE_QUANTITY);
        let items = self
            .items
            .iter()
            .map(|i| {
                if i.matches(key) {
                    CartLineItem {
                        quantity,
                        ..i.clone()
                    }
                } else {
                    i.clone()
                }
            })
            .collect();
        self.with_items(items)
    }

    pub fn without(&self, key: &LineKey) -> Cart {
        let items = self
            .items
            .iter()
            .filter(|i| !i.matches(key))
            .cloned()
            .collect();
        self.with_items(items)
    }

    /// Applies a partial update. If the update moves an entry onto the key
    /// of another entry, the two are folded together by summing quantities.
    pub fn with_fields(&self, key: &LineKey, update: &CartItemUpdate) -> Result<Cart, ValidationError> {
        let touched: Vec<bool> = self.items.iter().map(|i| i.matches(key)).collect();
        let mut items = self.items.clone();

        for (item, _) in items.iter_mut().zip(&touched).filter(|(_, t)| **t) {
            if let Some(q) = update.quantity.filter(|q| *q >= 1) {
                item.quantity = q.min(MAX_LINE_QUANTITY);
            }
            if let Some(size) = &update.size {
                item.size = normalize_text(Some(size));
            }
            if let Some(description) = &update.description {
                item.description = normalize_text(Some(description));
            }
            if item
                .description
                .as_deref()
                .is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_CHARS)
            {
                return Err(ValidationError::DescriptionTooLong);
            }
        }

        let mut result: Vec<CartLineItem> = Vec::with_capacity(items.len());
        let mut folded: Vec<CartLineItem> = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            let collides = touched.get(idx).copied().unwrap_or(false)
                && !item.matches(key)
                && items
                    .iter()
                    .zip(&touched)
                    .any(|(other, t)| !*t && other.matches(&item.key()));
            if collides {
                folded.push(item.clone());
            } else {
                result.push(item.clone());
            }
        }
        for item in folded {
            let new_key = item.key();
            if let Some(target) = result.iter_mut().find(|r| r.matches(&new_key)) {
                target.quantity = target
                    .quantity
                    .saturating_add(item.quantity)
                    .min(MAX_LINE_QUANTITY);
            }
        }
        Ok(self.with_items(result))
    }

    pub fn cleared(&self) -> Cart {
        Cart::empty()
    }

    pub fn with_promo(&self, code: String) -> Result<Cart, ValidationError> {
        if self.promo_code.is_some() {
            return Err(ValidationError::DuplicatePromo);
        }
        Ok(Cart {
            items: self.items.clone(),
            promo_code: Some(code),
        })
    }

    pub fn without_promo(&self) -> Cart {
        Cart {
            items: self.items.clone(),
            promo_code: None,
        }
    }

    fn with_items(&self, items: Vec<CartLineItem>) -> Cart {
        Cart {
            items,
            promo_code: self.promo_code.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: &str, size: Option<&str>, description: Option<&str>, qty: u32) -> CartLineItem {
        CartLineItem {
            product_id: product.to_string(),
            size: size.map(str::to_string),
            description: description.map(str::to_string),
            quantity: qty,
            unit_price_minor: 2599,
        }
    }

    #[test]
    fn identities_use_distinct_storage_namespaces() {
        assert_eq!(CartIdentity::Device("abc".into()).storage_key(), "device:abc");
        assert_eq!(CartIdentity::Account("abc".into()).storage_key(), "account:abc");
    }

    #[test]
    fn storage_fit_counts_the_namespace_prefix() {
        assert!(CartIdentity::Device("d".repeat(248)).fits_storage());
        assert!(!CartIdentity::Device("d".repeat(249)).fits_storage());
        assert!(!CartIdentity::Account("a".repeat(248)).fits_storage());
    }

    #[test]
    fn repeated_adds_sum_quantity_on_one_entry() {
        let cart = Cart::empty()
            .added(line("personalized", Some("iPhone 15"), Some("cats"), 1))
            .and_then(|c| c.added(line("personalized", Some("iPhone 15"), Some("cats"), 2)))
            .expect("adds succeed");
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[test]
    fn adds_past_the_line_limit_are_rejected() {
        let full = Cart::empty()
            .added(line("random", Some("S"), None, MAX_LINE_QUANTITY))
            .expect("add at the limit");
        assert_eq!(
            full.added(line("random", Some("S"), None, 1)),
            Err(ValidationError::InvalidQuantity)
        );
        assert_eq!(
            Cart::empty().added(line("random", Some("S"), None, u32::MAX)),
            Err(ValidationError::InvalidQuantity)
        );
        assert_eq!(full.total_quantity(), MAX_LINE_QUANTITY);
    }

    #[test]
    fn explicit_quantities_clamp_to_the_line_limit() {
        let key = LineKey::new("random", Some("S"), None);
        let cart = Cart::from_items(vec![line("random", Some("S"), None, u32::MAX)]);
        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
        let cart = cart.with_quantity(&key, u32::MAX);
        assert_eq!(cart.items[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn no_two_entries_share_a_key_after_adds() {
        let adds = [
            line("random", Some("S"), None, 1),
            line("random", Some("S"), Some(""), 1),
            line("random", Some("S"), Some("  "), 2),
            line("random", Some("M"), None, 1),
            line("personalized", Some("S"), Some("dog"), 1),
            line("personalized", Some("S"), Some(" dog "), 1),
        ];
        let mut cart = Cart::empty();
        for item in adds {
            cart = cart.added(item).expect("add succeeds");
        }
        let mut keys: Vec<LineKey> = cart.items.iter().map(CartLineItem::key).collect();
        let before = keys.len();
        keys.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        keys.dedup();
        assert_eq!(keys.len(), before);
        assert_eq!(cart.items.len(), 3);
        assert_eq!(cart.total_quantity(), 7);
    }

    #[test]
    fn blank_description_is_equivalent_to_absent() {
        let cart = Cart::empty()
            .added(line("random", None, Some("   "), 1))
            .expect("add succeeds");
        assert_eq!(cart.items[0].description, None);
        assert!(!cart.items[0].is_personalized());
    }

    #[test]
    fn zero_quantity_add_is_rejected() {
        assert_eq!(
            Cart::empty().added(line("random", None, None, 0)),
            Err(ValidationError::InvalidQuantity)
        );
    }

    #[test]
    fn overlong_description_is_rejected() {
        let brief = "x".repeat(MAX_DESCRIPTION_CHARS + 1);
        assert_eq!(
            Cart::empty().added(line("personalized", None, Some(&brief), 1)),
            Err(ValidationError::DescriptionTooLong)
        );
    }

    #[test]
    fn quantity_below_one_is_ignored() {
        let cart = Cart::empty()
            .added(line("random", Some("S"), None, 2))
            .expect("add succeeds");
        let key = LineKey::new("random", Some("S"), None);
        assert_eq!(cart.with_quantity(&key, 0), cart);
        assert_eq!(cart.with_quantity(&key, 5).items[0].quantity, 5);
    }

    #[test]
    fn remove_drops_only_the_addressed_key() {
        let cart = Cart::empty()
            .added(line("random", Some("S"), None, 1))
            .and_then(|c| c.added(line("random", Some("M"), None, 1)))
            .expect("adds succeed");
        let cart = cart.without(&LineKey::new("random", Some("S"), None));
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].size.as_deref(), Some("M"));
    }

    #[test]
    fn field_update_onto_existing_key_folds_entries() {
        let cart = Cart::empty()
            .added(line("random", Some("S"), None, 1))
            .and_then(|c| c.added(line("random", Some("M"), None, 2)))
            .expect("adds succeed");
        let update = CartItemUpdate {
            size: Some("M".to_string()),
            ..CartItemUpdate::default()
        };
        let cart = cart
            .with_fields(&LineKey::new("random", Some("S"), None), &update)
            .expect("update succeeds");
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
    }

    #[test]
    fn field_update_keeps_position_and_ignores_zero_quantity() {
        let cart = Cart::empty()
            .added(line("personalized", None, Some("a"), 1))
            .and_then(|c| c.added(line("random", None, None, 1)))
            .expect("adds succeed");
        let update = CartItemUpdate {
            quantity: Some(0),
            description: Some("b".to_string()),
            ..CartItemUpdate::default()
        };
        let cart = cart
            .with_fields(&LineKey::new("personalized", None, Some("a")), &update)
            .expect("update succeeds");
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].description.as_deref(), Some("b"));
        assert_eq!(cart.items[0].quantity, 1);
    }

    #[test]
    fn second_promo_is_a_validation_error() {
        let cart = Cart::empty().with_promo("SAVE10".to_string()).expect("first promo");
        assert_eq!(
            cart.with_promo("SAVE20".to_string()),
            Err(ValidationError::DuplicatePromo)
        );
        assert!(cart.without_promo().promo_code.is_none());
    }

    #[test]
    fn from_items_normalizes_persisted_rows() {
        let cart = Cart::from_items(vec![
            line("random", Some(""), Some(" "), 1),
            line("random", None, None, 0),
        ]);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].size, None);
        assert_eq!(cart.items[0].description, None);
    }
}
