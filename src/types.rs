use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

pub type ProductId = u32;

/// A catalog record. Products are read-only once the catalog is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id:            ProductId,
    pub name:          String,
    pub price:         f64,
    #[serde(default)]
    pub image:         String,
    pub category:      String,
    pub main_category: String,
    #[serde(default)]
    pub description:   String,
    #[serde(default)]
    pub rating:        f64,
    #[serde(default)]
    pub stock:         u32,
    /// Percent off the list price, 0 to 100.
    #[serde(default)]
    pub discount:      f64,
}

impl Product {
    pub fn has_discount(&self) -> bool {
        self.discount > 0.0
    }

    /// Unit price after the discount is applied.
    pub fn discounted_price(&self) -> f64 {
        if self.has_discount() {
            self.price * (1.0 - self.discount.min(100.0) / 100.0)
        }
        else {
            self.price
        }
    }

    /// Bound a quantity selection to what is in stock. Out-of-stock products always yield 0.
    pub fn clamp_quantity(&self, requested: i64) -> u32 {
        let requested = u32::try_from(requested.max(1)).unwrap_or(u32::MAX);
        requested.min(self.stock)
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity:   u32,
    // The snapshot taken when the item was added or last reconciled with the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product:    Option<Product>,
}

impl CartItem {
    pub fn new(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            quantity,
            product: Some(product.clone()),
        }
    }

    /// Discounted price times quantity. Items without a known product are worth nothing.
    pub fn line_total(&self) -> f64 {
        self.product
            .as_ref()
            .map_or(0.0, |p| p.discounted_price() * self.quantity as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// A main category with the sub-categories listed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub label:      String,
    pub path:       String,
    pub categories: Vec<String>,
}

impl Section {
    pub fn new<S: ToString>(label: S, path: S, categories: &[&str]) -> Self {
        Self {
            label:      label.to_string(),
            path:       path.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn defaults() -> Vec<Section> {
        vec![
            Section::new(
                "INTERIOR",
                "/interior",
                &["Living Room", "Bedroom", "Kitchen", "Bathroom", "Office"],
            ),
            Section::new(
                "GARDEN & PATIO",
                "/garden-patio",
                &["Furniture", "Plants", "Decor", "Tools", "Lighting"],
            ),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub subtotal: f64,
    /// Shipping is always free.
    pub shipping: f64,
    pub tax:      f64,
    pub total:    f64,
}

impl OrderSummary {
    pub fn new(subtotal: f64, tax_rate: f64) -> Self {
        let tax = subtotal * tax_rate;
        Self {
            subtotal,
            shipping: 0.0,
            tax,
            total: subtotal + tax,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub items:     Vec<CartItem>,
    pub summary:   OrderSummary,
    pub placed_at: DateTime<Utc>,
}
