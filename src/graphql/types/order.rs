use crate::domain::{Order as DomainOrder, OrderDraft, OrderItem as DomainOrderItem};
use crate::graphql::schema::{ClientInfo, GraphQLContext};
use crate::graphql::types::Product;
use crate::graphql::GqlResultExt;
use crate::orders::ClientTotals;
use async_graphql::{Context, FieldResult, InputObject, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// GraphQL representation of an Order
#[derive(Clone)]
pub struct Order {
    pub inner: DomainOrder,
    /// Lines already at hand when the order was just placed
    pub items: Option<Vec<DomainOrderItem>>,
}

impl From<DomainOrder> for Order {
    fn from(order: DomainOrder) -> Self {
        Self {
            inner: order,
            items: None,
        }
    }
}

#[Object]
impl Order {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    /// Public order identifier, e.g. FC20251018/K7QZ
    async fn order_id(&self) -> &str {
        &self.inner.order_id
    }

    async fn customer_name(&self) -> &str {
        &self.inner.customer_name
    }

    async fn customer_email(&self) -> Option<&str> {
        self.inner.customer_email.as_deref()
    }

    async fn customer_phone(&self) -> &str {
        &self.inner.customer_phone
    }

    async fn shipping_address(&self) -> &str {
        &self.inner.shipping_address
    }

    async fn shipping_city(&self) -> &str {
        &self.inner.shipping_city
    }

    async fn shipping_zip(&self) -> &str {
        &self.inner.shipping_zip
    }

    async fn delivery_notes(&self) -> &str {
        &self.inner.delivery_notes
    }

    async fn preferred_delivery_time(&self) -> &str {
        &self.inner.preferred_delivery_time
    }

    async fn subtotal(&self) -> Decimal {
        self.inner.subtotal
    }

    async fn discount_total(&self) -> Decimal {
        self.inner.discount_total
    }

    async fn shipping_fee(&self) -> Decimal {
        self.inner.shipping_fee
    }

    async fn grand_total(&self) -> Decimal {
        self.inner.grand_total
    }

    /// One of placed, delivered, canceled
    async fn status(&self) -> &str {
        self.inner.status.as_str()
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }

    async fn items(&self, ctx: &Context<'_>) -> FieldResult<Vec<OrderItem>> {
        let items = match &self.items {
            Some(items) => items.clone(),
            None => {
                let context = ctx.data::<GraphQLContext>()?;
                context.storage.list_order_items(self.inner.id).await.gql()?
            }
        };
        Ok(items.into_iter().map(OrderItem::from).collect())
    }
}

/// GraphQL representation of an OrderItem
#[derive(Clone)]
pub struct OrderItem {
    pub inner: DomainOrderItem,
}

impl From<DomainOrderItem> for OrderItem {
    fn from(item: DomainOrderItem) -> Self {
        Self { inner: item }
    }
}

#[Object]
impl OrderItem {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn product(&self, ctx: &Context<'_>) -> FieldResult<Option<Product>> {
        let context = ctx.data::<GraphQLContext>()?;
        let product = context.product_loader.load_one(self.inner.product_id).await?;
        Ok(product.map(Product::from))
    }

    /// Product name at checkout time
    async fn name_snapshot(&self) -> &str {
        &self.inner.name_snapshot
    }

    async fn unit_price_snapshot(&self) -> Decimal {
        self.inner.unit_price_snapshot
    }

    async fn quantity(&self) -> u32 {
        self.inner.quantity
    }

    async fn line_total(&self) -> Decimal {
        self.inner.line_total
    }
}

/// Checkout form
#[derive(InputObject)]
pub struct OrderInput {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_zip: String,
    pub delivery_notes: Option<String>,
    pub preferred_delivery_time: Option<String>,
    /// Storefront-computed subtotal; the cart's own total is what gets stored
    pub subtotal: Decimal,
    pub grand_total: Decimal,
}

impl OrderInput {
    pub fn into_draft(self, client: &ClientInfo) -> (OrderDraft, ClientTotals) {
        let totals = ClientTotals {
            subtotal: Some(self.subtotal),
            grand_total: Some(self.grand_total),
        };
        let draft = OrderDraft {
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            shipping_address: self.shipping_address,
            shipping_city: self.shipping_city,
            shipping_zip: self.shipping_zip,
            delivery_notes: self.delivery_notes.unwrap_or_default(),
            preferred_delivery_time: self.preferred_delivery_time.unwrap_or_default(),
            placed_ip: client.ip.clone(),
            placed_user_agent: client.user_agent.clone(),
        };
        (draft, totals)
    }
}

#[derive(SimpleObject)]
pub struct OrderPayload {
    pub success: bool,
    pub order: Option<Order>,
}
