pub mod loaders;
pub mod resolvers;
pub mod schema;
pub mod types;

pub use schema::{create_schema, ClientInfo, GraphQLContext, GraphQLSchema, MediaUrls};

use crate::common::error::ShopError;
use async_graphql::{ErrorExtensions, ID};

/// Lift a shop result into a GraphQL result carrying `extensions.code`.
pub(crate) trait GqlResultExt<T> {
    fn gql(self) -> async_graphql::Result<T>;
}

impl<T> GqlResultExt<T> for crate::common::error::Result<T> {
    fn gql(self) -> async_graphql::Result<T> {
        self.map_err(|e| e.extend())
    }
}

/// Numeric row id from a GraphQL `ID`.
pub(crate) fn parse_id(id: &ID) -> async_graphql::Result<i64> {
    id.parse::<i64>()
        .map_err(|_| ShopError::Validation(format!("Invalid id '{}'", id.as_str())).extend())
}
