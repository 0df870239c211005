//! Initial catalog import from JSON files.
//!
//! Both imports are idempotent: entries whose slug already exists are left
//! untouched, malformed entries are skipped with a warning.

use crate::common::error::{Result, ShopError};
use crate::domain::{NewCategory, NewProduct};
use crate::storage::Storage;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info, warn};

/// Counts reported after a seed run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub categories_created: usize,
    pub categories_skipped: usize,
    pub products_created: usize,
    pub products_skipped: usize,
    /// Entries rejected for missing fields or an unknown category.
    pub invalid: usize,
}

#[derive(Debug, Deserialize)]
struct CategoryFixture {
    #[serde(default)]
    fields: CategoryFields,
}

#[derive(Debug, Default, Deserialize)]
struct CategoryFields {
    name: Option<String>,
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductEntry {
    name: Option<String>,
    slug: Option<String>,
    category_slug: Option<String>,
    description: Option<String>,
    price: Option<Value>,
    sku: Option<String>,
    ean: Option<String>,
    ean_carton: Option<String>,
    neta: Option<Value>,
    vat: Option<Value>,
    stock_qty: Option<Value>,
    is_active: Option<Value>,
    only_for_rent: Option<Value>,
    image: Option<String>,
}

/// Decimal from a JSON number or a loosely formatted string; anything else is zero.
pub fn parse_decimal(value: Option<&Value>) -> Decimal {
    let text = match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s
            .chars()
            .filter(|c| *c != ' ' && *c != '\u{a0}')
            .map(|c| if c == ',' { '.' } else { c })
            .collect(),
        _ => return Decimal::ZERO,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .unwrap_or(Decimal::ZERO)
}

fn parse_stock(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX)),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// JSON truthiness, `default` when absent.
fn parse_flag(value: Option<&Value>, default: bool) -> bool {
    match value {
        None => default,
        Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parsed JSON array from `path`, `None` when the file is missing.
fn load_entries<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<Vec<T>>> {
    if !path.exists() {
        warn!("Seed file not found, skipping: {}", path.display());
        return Ok(None);
    }
    let raw = fs::read_to_string(path)?;
    let entries = serde_json::from_str(&raw).map_err(|e| {
        error!("Invalid JSON in {}: {}", path.display(), e);
        ShopError::Json(e)
    })?;
    Ok(Some(entries))
}

pub async fn seed_categories(storage: &dyn Storage, path: &Path, report: &mut SeedReport) -> Result<()> {
    let Some(entries) = load_entries::<CategoryFixture>(path)? else {
        return Ok(());
    };

    for entry in entries {
        let (Some(name), Some(slug)) = (non_blank(entry.fields.name), non_blank(entry.fields.slug)) else {
            warn!("Category entry without name or slug, skipping");
            report.invalid += 1;
            continue;
        };
        if storage.get_category_by_slug(&slug).await?.is_some() {
            info!("Category '{}' exists, skipping", slug);
            report.categories_skipped += 1;
            continue;
        }
        match storage.create_category(NewCategory { name, slug }).await {
            Ok(category) => {
                info!("Created category {}", category.name);
                report.categories_created += 1;
            }
            Err(ShopError::Conflict(message)) => {
                warn!("Category skipped: {}", message);
                report.categories_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Categories done: created {}, skipped {}",
        report.categories_created, report.categories_skipped
    );
    Ok(())
}

pub async fn seed_products(storage: &dyn Storage, path: &Path, report: &mut SeedReport) -> Result<()> {
    let Some(entries) = load_entries::<ProductEntry>(path)? else {
        return Ok(());
    };

    for entry in entries {
        let (Some(name), Some(slug), Some(category_slug)) = (
            non_blank(entry.name),
            non_blank(entry.slug),
            non_blank(entry.category_slug),
        ) else {
            warn!("Product entry without name, slug or category_slug, skipping");
            report.invalid += 1;
            continue;
        };
        let Some(category) = storage.get_category_by_slug(&category_slug).await? else {
            warn!("Unknown category '{}' for product {}, skipping", category_slug, name);
            report.invalid += 1;
            continue;
        };
        if storage.get_product_by_slug(&slug).await?.is_some() {
            info!("Product '{}' exists, skipping", slug);
            report.products_skipped += 1;
            continue;
        }

        let product = NewProduct {
            description: entry.description.unwrap_or_default(),
            image: non_blank(entry.image),
            category_id: Some(category.id),
            sku: entry.sku.unwrap_or_default(),
            ean: entry.ean.unwrap_or_default(),
            ean_carton: entry.ean_carton.unwrap_or_default(),
            neta: parse_decimal(entry.neta.as_ref()),
            vat: parse_decimal(entry.vat.as_ref()),
            stock_qty: parse_stock(entry.stock_qty.as_ref()),
            is_active: parse_flag(entry.is_active.as_ref(), true),
            only_for_rent: parse_flag(entry.only_for_rent.as_ref(), false),
            ..NewProduct::new(name, slug, parse_decimal(entry.price.as_ref()))
        };
        match storage.create_product(product).await {
            Ok(product) => {
                info!("Created product {}", product.name);
                report.products_created += 1;
            }
            Err(ShopError::Conflict(message)) => {
                warn!("Product skipped: {}", message);
                report.products_skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Products done: created {}, skipped {}",
        report.products_created, report.products_skipped
    );
    Ok(())
}

/// Import categories first so products can reference them.
pub async fn run(storage: &dyn Storage, categories: &Path, products: &Path) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    seed_categories(storage, categories, &mut report).await?;
    seed_products(storage, products, &mut report).await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn json_file(value: Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", value).unwrap();
        file
    }

    #[test]
    fn decimals_tolerate_local_formatting() {
        assert_eq!(parse_decimal(Some(&json!("12 990,50"))), Decimal::new(1299050, 2));
        assert_eq!(parse_decimal(Some(&json!("1\u{a0}000"))), Decimal::new(1000, 0));
        assert_eq!(parse_decimal(Some(&json!(27))), Decimal::new(27, 0));
        assert_eq!(parse_decimal(Some(&json!("n/a"))), Decimal::ZERO);
        assert_eq!(parse_decimal(None), Decimal::ZERO);
    }

    #[test]
    fn flags_follow_json_truthiness() {
        assert!(parse_flag(None, true));
        assert!(!parse_flag(Some(&json!(0)), true));
        assert!(parse_flag(Some(&json!("yes")), false));
        assert_eq!(parse_stock(Some(&json!("12"))), 12);
        assert_eq!(parse_stock(Some(&json!(-3))), 0);
    }

    #[tokio::test]
    async fn seed_is_idempotent_and_skips_bad_entries() {
        let storage = InMemoryStorage::new();
        let categories = json_file(json!([
            { "model": "catalog.category", "pk": 1, "fields": { "name": "Kávé", "slug": "kave" } },
            { "model": "catalog.category", "pk": 2, "fields": { "name": "" } }
        ]));
        let products = json_file(json!([
            { "name": "Crema", "slug": "crema", "category_slug": "kave", "price": "4 990,00", "stock_qty": 5 },
            { "name": "Ghost", "slug": "ghost", "category_slug": "nincs" },
            { "slug": "no-name", "category_slug": "kave" }
        ]));

        let first = run(&storage, categories.path(), products.path()).await.unwrap();
        assert_eq!(first.categories_created, 1);
        assert_eq!(first.products_created, 1);
        assert_eq!(first.invalid, 3);

        let product = storage.get_product_by_slug("crema").await.unwrap().unwrap();
        assert_eq!(product.price, Decimal::new(499000, 2));
        assert_eq!(product.stock_qty, 5);
        assert!(product.is_active);

        let second = run(&storage, categories.path(), products.path()).await.unwrap();
        assert_eq!(second.categories_created, 0);
        assert_eq!(second.categories_skipped, 1);
        assert_eq!(second.products_skipped, 1);
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let storage = InMemoryStorage::new();
        let report = run(
            &storage,
            Path::new("/nonexistent/categories.json"),
            Path::new("/nonexistent/products.json"),
        )
        .await
        .unwrap();
        assert_eq!(report, SeedReport::default());
    }
}
