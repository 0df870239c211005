use crate::common::constants::CONTACT_PAGE_SIZE;
use crate::common::error::ShopError;
use crate::domain::ProductFilter;
use crate::graphql::resolvers::cart_session;
use crate::graphql::schema::GraphQLContext;
use crate::graphql::types::{Cart, Category, ContactMessage, Order, Product, SiteContent, SiteSettings};
use crate::graphql::GqlResultExt;
use async_graphql::{Context, ErrorExtensions, FieldResult, Object};

/// Root query object for GraphQL
pub struct Query;

#[Object]
impl Query {
    /// All categories ordered by name
    async fn categories(&self, ctx: &Context<'_>) -> FieldResult<Vec<Category>> {
        let context = ctx.data::<GraphQLContext>()?;
        let categories = context.storage.list_categories().await.gql()?;
        Ok(categories.into_iter().map(Category::from).collect())
    }

    /// Storefront product listing, ordered by name
    async fn products(
        &self,
        ctx: &Context<'_>,
        #[graphql(desc = "Category slug")] category: Option<String>,
        #[graphql(desc = "Case-insensitive match on name or description")] search: Option<String>,
        #[graphql(default = true)] is_active: bool,
    ) -> FieldResult<Vec<Product>> {
        let context = ctx.data::<GraphQLContext>()?;
        let filter = ProductFilter {
            category_slug: category.filter(|c| !c.trim().is_empty()),
            search,
            is_active,
        };
        let products = context.storage.list_products(&filter).await.gql()?;
        Ok(products.into_iter().map(Product::from).collect())
    }

    /// An active product by slug
    async fn product(&self, ctx: &Context<'_>, slug: String) -> FieldResult<Option<Product>> {
        let context = ctx.data::<GraphQLContext>()?;
        let product = context.storage.get_product_by_slug(&slug).await.gql()?;
        Ok(product.filter(|p| p.is_active).map(Product::from))
    }

    /// The caller's cart, created on first access
    async fn cart(&self, ctx: &Context<'_>) -> FieldResult<Cart> {
        let context = ctx.data::<GraphQLContext>()?;
        let session = cart_session(ctx)?;
        let cart = session
            .resolve(context.storage.as_ref(), context.cart_ttl)
            .await
            .gql()?;
        Cart::load(context.storage.as_ref(), cart).await.gql()
    }

    /// All orders, newest first
    async fn orders(&self, ctx: &Context<'_>) -> FieldResult<Vec<Order>> {
        let context = ctx.data::<GraphQLContext>()?;
        let orders = context.storage.list_orders().await.gql()?;
        Ok(orders.into_iter().map(Order::from).collect())
    }

    /// An order by its public id
    async fn order(&self, ctx: &Context<'_>, order_id: String) -> FieldResult<Option<Order>> {
        let context = ctx.data::<GraphQLContext>()?;
        let order = context
            .storage
            .get_order_by_order_id(order_id.trim())
            .await
            .gql()?;
        Ok(order.map(Order::from))
    }

    async fn site_content(&self, ctx: &Context<'_>) -> FieldResult<SiteContent> {
        let context = ctx.data::<GraphQLContext>()?;
        let content = context.storage.get_site_content().await.gql()?;
        Ok(content.into())
    }

    async fn site_settings(&self, ctx: &Context<'_>) -> FieldResult<SiteSettings> {
        let context = ctx.data::<GraphQLContext>()?;
        let settings = context.storage.get_site_settings().await.gql()?;
        Ok(settings.into())
    }

    /// Contact inbox page, newest first
    async fn contact_messages(
        &self,
        ctx: &Context<'_>,
        #[graphql(default_with = "CONTACT_PAGE_SIZE")] limit: i32,
        #[graphql(default = 0)] offset: i32,
    ) -> FieldResult<Vec<ContactMessage>> {
        let context = ctx.data::<GraphQLContext>()?;
        if limit < 0 || offset < 0 {
            return Err(ShopError::Validation(
                "limit and offset must not be negative".to_string(),
            )
            .extend());
        }
        let messages = context
            .storage
            .list_contact_messages(limit as usize, offset as usize)
            .await
            .gql()?;
        Ok(messages.into_iter().map(ContactMessage::from).collect())
    }
}
