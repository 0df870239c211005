#![allow(dead_code)]

use async_graphql::{Request, Variables};
use chrono::Duration;
use family_coffee::cart::CartSession;
use family_coffee::graphql::{create_schema, ClientInfo, GraphQLContext, GraphQLSchema, MediaUrls};
use family_coffee::storage::{InMemoryStorage, Storage};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub struct TestShop {
    pub storage: Arc<dyn Storage>,
    pub schema: GraphQLSchema,
}

impl TestShop {
    pub fn new() -> Self {
        Self::with_storage(Arc::new(InMemoryStorage::new()))
    }

    pub fn with_storage(storage: Arc<dyn Storage>) -> Self {
        let context = GraphQLContext::new(
            storage.clone(),
            MediaUrls::new("http://shop.test", "/media/"),
            Duration::days(30),
            None,
        );
        Self {
            storage,
            schema: create_schema(context),
        }
    }

    /// Run `query` as a caller holding `cart`; returns the JSON response and the session.
    pub async fn run_as(&self, cart: Option<Uuid>, query: &str, variables: Value) -> (Value, Arc<CartSession>) {
        let session = Arc::new(CartSession::new(cart));
        let request = Request::new(query)
            .variables(Variables::from_json(variables))
            .data(session.clone())
            .data(ClientInfo {
                ip: Some("203.0.113.9".to_string()),
                user_agent: "integration-test".to_string(),
            });
        let response = self.schema.execute(request).await;
        (serde_json::to_value(&response).unwrap(), session)
    }

    pub async fn run(&self, query: &str, variables: Value) -> Value {
        self.run_as(None, query, variables).await.0
    }
}

/// `extensions.code` of the first error, if any.
pub fn error_code(response: &Value) -> Option<&str> {
    response["errors"][0]["extensions"]["code"].as_str()
}

pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    value.as_str().unwrap().parse().unwrap()
}
