use crate::domain::{Category, Product, ProductImage};
use crate::storage::Storage;
use async_graphql::dataloader::{DataLoader, Loader};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// DataLoader for batching category lookups
pub struct CategoryLoader {
    storage: Arc<dyn Storage>,
}

impl CategoryLoader {
    pub fn new(storage: Arc<dyn Storage>) -> DataLoader<Self> {
        DataLoader::new(Self { storage }, tokio::spawn)
    }
}

#[async_trait]
impl Loader<i64> for CategoryLoader {
    type Value = Category;
    type Error = String;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        let categories = self
            .storage
            .get_categories_by_ids(keys.to_vec())
            .await
            .map_err(|e| e.to_string())?;

        Ok(categories.into_iter().map(|c| (c.id, c)).collect())
    }
}

/// DataLoader for batching product lookups from cart and order lines
pub struct ProductLoader {
    storage: Arc<dyn Storage>,
}

impl ProductLoader {
    pub fn new(storage: Arc<dyn Storage>) -> DataLoader<Self> {
        DataLoader::new(Self { storage }, tokio::spawn)
    }
}

#[async_trait]
impl Loader<i64> for ProductLoader {
    type Value = Product;
    type Error = String;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        let products = self
            .storage
            .get_products_by_ids(keys.to_vec())
            .await
            .map_err(|e| e.to_string())?;

        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }
}

/// DataLoader for a product's gallery images, keyed by product id
pub struct ProductImagesLoader {
    storage: Arc<dyn Storage>,
}

impl ProductImagesLoader {
    pub fn new(storage: Arc<dyn Storage>) -> DataLoader<Self> {
        DataLoader::new(Self { storage }, tokio::spawn)
    }
}

#[async_trait]
impl Loader<i64> for ProductImagesLoader {
    type Value = Vec<ProductImage>;
    type Error = String;

    async fn load(&self, keys: &[i64]) -> Result<HashMap<i64, Self::Value>, Self::Error> {
        let images = self
            .storage
            .get_images_for_products(keys.to_vec())
            .await
            .map_err(|e| e.to_string())?;

        // Products without images still get an entry so they are not reported missing
        let mut map: HashMap<i64, Vec<ProductImage>> =
            keys.iter().map(|id| (*id, Vec::new())).collect();
        for image in images {
            map.entry(image.product_id).or_default().push(image);
        }
        Ok(map)
    }
}
