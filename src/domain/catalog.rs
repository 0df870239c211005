use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default VAT percentage applied to new products.
pub const DEFAULT_VAT_PERCENT: Decimal = Decimal::from_parts(2700, 0, 0, false, 2);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    /// Stored media path, relative to the media root.
    pub image: Option<String>,
    pub category_id: Option<i64>,
    pub sku: String,
    pub ean: String,
    pub ean_carton: String,
    pub neta: Decimal,
    pub vat: Decimal,
    pub stock_qty: u32,
    pub is_active: bool,
    pub only_for_rent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub image: Option<String>,
    pub category_id: Option<i64>,
    pub sku: String,
    pub ean: String,
    pub ean_carton: String,
    pub neta: Decimal,
    pub vat: Decimal,
    pub stock_qty: u32,
    pub is_active: bool,
    pub only_for_rent: bool,
}

impl NewProduct {
    /// A product with the catalog defaults for everything but name, slug and price.
    pub fn new(name: impl Into<String>, slug: impl Into<String>, price: Decimal) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            description: String::new(),
            price,
            image: None,
            category_id: None,
            sku: String::new(),
            ean: String::new(),
            ean_carton: String::new(),
            neta: Decimal::ZERO,
            vat: DEFAULT_VAT_PERCENT,
            stock_qty: 0,
            is_active: true,
            only_for_rent: false,
        }
    }
}

/// Partial update of a product; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image: Option<Option<String>>,
    pub category_id: Option<Option<i64>>,
    pub sku: Option<String>,
    pub ean: Option<String>,
    pub ean_carton: Option<String>,
    pub neta: Option<Decimal>,
    pub vat: Option<Decimal>,
    pub stock_qty: Option<u32>,
    pub is_active: Option<bool>,
    pub only_for_rent: Option<bool>,
}

impl ProductPatch {
    pub fn apply(self, product: &mut Product) {
        if let Some(v) = self.name {
            product.name = v;
        }
        if let Some(v) = self.slug {
            product.slug = v;
        }
        if let Some(v) = self.description {
            product.description = v;
        }
        if let Some(v) = self.price {
            product.price = v;
        }
        if let Some(v) = self.image {
            product.image = v;
        }
        if let Some(v) = self.category_id {
            product.category_id = v;
        }
        if let Some(v) = self.sku {
            product.sku = v;
        }
        if let Some(v) = self.ean {
            product.ean = v;
        }
        if let Some(v) = self.ean_carton {
            product.ean_carton = v;
        }
        if let Some(v) = self.neta {
            product.neta = v;
        }
        if let Some(v) = self.vat {
            product.vat = v;
        }
        if let Some(v) = self.stock_qty {
            product.stock_qty = v;
        }
        if let Some(v) = self.is_active {
            product.is_active = v;
        }
        if let Some(v) = self.only_for_rent {
            product.only_for_rent = v;
        }
    }
}

/// Storefront product listing filter.
#[derive(Debug, Clone)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub search: Option<String>,
    pub is_active: bool,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            category_slug: None,
            search: None,
            is_active: true,
        }
    }
}

impl ProductFilter {
    /// Case-insensitive substring match on name or description.
    pub fn matches_search(&self, product: &Product) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                product.name.to_lowercase().contains(&needle)
                    || product.description.to_lowercase().contains(&needle)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: i64,
    pub product_id: i64,
    pub image: String,
    pub alt: String,
    pub ordering: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProductImage {
    pub product_id: i64,
    pub image: String,
    pub alt: String,
    pub ordering: u32,
}
