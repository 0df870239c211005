pub mod mutation;
pub mod query;

pub use mutation::Mutation;
pub use query::Query;

use crate::cart::CartSession;
use async_graphql::{Context, FieldResult};
use std::sync::Arc;

/// The request's cart session, attached by the HTTP layer.
pub(crate) fn cart_session<'a>(ctx: &Context<'a>) -> FieldResult<&'a Arc<CartSession>> {
    ctx.data::<Arc<CartSession>>()
}
