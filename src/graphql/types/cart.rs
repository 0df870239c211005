use crate::common::error::Result;
use crate::domain::{cart_totals, Cart as DomainCart, CartItem as DomainCartItem};
use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::Product;
use crate::storage::Storage;
use async_graphql::{Context, FieldResult, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// GraphQL representation of a Cart together with its lines
#[derive(Clone)]
pub struct Cart {
    pub inner: DomainCart,
    pub items: Vec<DomainCartItem>,
}

impl Cart {
    /// Snapshot of `cart` and its current lines.
    pub async fn load(storage: &dyn Storage, cart: DomainCart) -> Result<Self> {
        let items = storage.list_cart_items(cart.id).await?;
        Ok(Self { inner: cart, items })
    }
}

#[Object]
impl Cart {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    /// Token carried by the cart cookie
    async fn token(&self) -> String {
        self.inner.token.to_string()
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }

    async fn items(&self) -> Vec<CartItem> {
        self.items.iter().cloned().map(CartItem::from).collect()
    }

    /// Sum of line quantities, clamped to the Int range
    async fn total_items(&self) -> i32 {
        i32::try_from(cart_totals(&self.items).0).unwrap_or(i32::MAX)
    }

    /// Sum of line totals
    async fn total_price(&self) -> Decimal {
        cart_totals(&self.items).1
    }
}

/// GraphQL representation of a CartItem
#[derive(Clone)]
pub struct CartItem {
    pub inner: DomainCartItem,
}

impl From<DomainCartItem> for CartItem {
    fn from(item: DomainCartItem) -> Self {
        Self { inner: item }
    }
}

#[Object]
impl CartItem {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn product(&self, ctx: &Context<'_>) -> FieldResult<Option<Product>> {
        let context = ctx.data::<GraphQLContext>()?;
        let product = context.product_loader.load_one(self.inner.product_id).await?;
        Ok(product.map(Product::from))
    }

    async fn quantity(&self) -> u32 {
        self.inner.quantity
    }

    /// Unit price when the line was first added
    async fn unit_price_snapshot(&self) -> Decimal {
        self.inner.unit_price_snapshot
    }

    async fn line_total(&self) -> Decimal {
        self.inner.line_total
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }
}

#[derive(SimpleObject)]
pub struct CartPayload {
    pub success: bool,
    pub cart: Option<Cart>,
}
