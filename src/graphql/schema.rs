use crate::graphql::loaders::{CategoryLoader, ProductImagesLoader, ProductLoader};
use crate::graphql::resolvers::{Mutation, Query};
use crate::mailer::OrderNotifier;
use crate::storage::Storage;
use async_graphql::dataloader::DataLoader;
use async_graphql::{EmptySubscription, Schema};
use chrono::Duration;
use std::sync::Arc;

/// Builds absolute URLs for stored media paths.
#[derive(Debug, Clone)]
pub struct MediaUrls {
    prefix: String,
}

impl MediaUrls {
    pub fn new(public_base_url: &str, media_url: &str) -> Self {
        let base = public_base_url.trim_end_matches('/');
        let media = media_url.trim_matches('/');
        let prefix = if media.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{media}/")
        };
        Self { prefix }
    }

    /// `None` for a missing or blank path; absolute URLs pass through.
    pub fn url(&self, path: Option<&str>) -> Option<String> {
        let path = path.map(str::trim).filter(|p| !p.is_empty())?;
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path.to_string());
        }
        Some(format!("{}{}", self.prefix, path.trim_start_matches('/')))
    }
}

/// Caller details attached to each request by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: String,
}

/// GraphQL context containing shared application state
pub struct GraphQLContext {
    pub storage: Arc<dyn Storage>,
    pub media: MediaUrls,
    pub cart_ttl: Duration,
    pub notifier: Option<OrderNotifier>,
    pub category_loader: DataLoader<CategoryLoader>,
    pub product_loader: DataLoader<ProductLoader>,
    pub images_loader: DataLoader<ProductImagesLoader>,
}

impl GraphQLContext {
    pub fn new(
        storage: Arc<dyn Storage>,
        media: MediaUrls,
        cart_ttl: Duration,
        notifier: Option<OrderNotifier>,
    ) -> Self {
        Self {
            category_loader: CategoryLoader::new(storage.clone()),
            product_loader: ProductLoader::new(storage.clone()),
            images_loader: ProductImagesLoader::new(storage.clone()),
            storage,
            media,
            cart_ttl,
            notifier,
        }
    }
}

/// The complete GraphQL schema
pub type GraphQLSchema = Schema<Query, Mutation, EmptySubscription>;

/// Create a new GraphQL schema around the given context
pub fn create_schema(context: GraphQLContext) -> GraphQLSchema {
    Schema::build(Query, Mutation, EmptySubscription)
        .data(context)
        .finish()
}
