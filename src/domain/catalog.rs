use serde::Serialize;
use utoipa::ToSchema;

use super::errors::ValidationError;

/// Immutable catalog record. Prices are base minor units before currency
/// conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub base_price_minor: i64,
    pub images: Vec<String>,
}

impl Product {
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, id: &str) -> Result<&Product, ValidationError> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .ok_or(ValidationError::UnknownProduct)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            Product {
                id: "personalized".to_string(),
                name: "Personalized".to_string(),
                base_price_minor: 2599,
                images: vec!["/images/example-0.png".to_string()],
            },
            Product {
                id: "random".to_string(),
                name: "Blind Box".to_string(),
                base_price_minor: 2199,
                images: vec!["/images/example-0.png".to_string()],
            },
        ])
    }
}
