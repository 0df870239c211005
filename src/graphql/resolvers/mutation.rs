use crate::common::constants::{MAX_CONTACT_NAME, MAX_IMAGE_ALT};
use crate::common::error::{Result, ShopError};
use crate::domain::{
    NewCategory, NewContactMessage, NewProductImage, OrderStatus, ProductFilter, SiteContentPatch,
    SiteSettingsPatch,
};
use crate::graphql::resolvers::cart_session;
use crate::graphql::schema::{ClientInfo, GraphQLContext};
use crate::graphql::types::catalog::{check_category, check_len};
use crate::graphql::types::{
    Cart, CartPayload, CategoryPayload, ContactMessagePayload, DeletePayload, Order, OrderInput,
    OrderPayload, ProductImagePayload, ProductInput, ProductPayload, ProductUpdateInput,
    SiteContentPayload, SiteSettingsPayload,
};
use crate::graphql::{parse_id, GqlResultExt};
use crate::metrics;
use crate::orders::place_order;
use crate::slug::{slugify, unique_slug};
use crate::storage::Storage;
use async_graphql::{Context, ErrorExtensions, FieldResult, MaybeUndefined, Object, ID};
use email_address::EmailAddress;
use std::collections::HashSet;
use tracing::info;

fn not_found(what: &str) -> async_graphql::Error {
    ShopError::NotFound(format!("{what} not found")).extend()
}

fn validation(message: &str) -> async_graphql::Error {
    ShopError::Validation(message.to_string()).extend()
}

fn positive_quantity(value: i32) -> FieldResult<u32> {
    if value < 1 {
        return Err(validation("Quantity must be at least 1"));
    }
    Ok(value as u32)
}

async fn taken_product_slugs(storage: &dyn Storage) -> Result<HashSet<String>> {
    let mut slugs = HashSet::new();
    for is_active in [true, false] {
        let filter = ProductFilter {
            is_active,
            ..ProductFilter::default()
        };
        slugs.extend(storage.list_products(&filter).await?.into_iter().map(|p| p.slug));
    }
    Ok(slugs)
}

async fn existing_category(storage: &dyn Storage, id: &ID) -> FieldResult<i64> {
    let category_id = parse_id(id)?;
    let found = storage
        .get_categories_by_ids(vec![category_id])
        .await
        .gql()?;
    if found.is_empty() {
        return Err(not_found("Category"));
    }
    Ok(category_id)
}

/// Trimmed value, or `None` for blank input.
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Root mutation object for GraphQL
pub struct Mutation;

impl Mutation {
    /// Current cart of the caller after a cart mutation, with the expiry slid forward.
    async fn touched_cart(&self, ctx: &Context<'_>, operation: &'static str) -> FieldResult<CartPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let session = cart_session(ctx)?;
        let storage = context.storage.as_ref();
        session.touch(storage, context.cart_ttl).await.gql()?;
        metrics::cart::mutation(operation);
        let cart = session.resolve(storage, context.cart_ttl).await.gql()?;
        Ok(CartPayload {
            success: true,
            cart: Some(Cart::load(storage, cart).await.gql()?),
        })
    }
}

#[Object]
impl Mutation {
    /// Add a product to the caller's cart, merging with an existing line
    async fn add_to_cart(&self, ctx: &Context<'_>, product_id: ID, quantity: i32) -> FieldResult<CartPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let storage = context.storage.as_ref();
        let quantity = positive_quantity(quantity)?;
        let product = storage
            .get_product(parse_id(&product_id)?)
            .await
            .gql()?
            .filter(|p| p.is_active)
            .ok_or_else(|| not_found("Product"))?;

        let cart = cart_session(ctx)?
            .resolve(storage, context.cart_ttl)
            .await
            .gql()?;
        storage
            .add_cart_item(cart.id, product.id, quantity, product.price)
            .await
            .gql()?;
        self.touched_cart(ctx, "add").await
    }

    /// Set a line's quantity; zero or less removes the line
    async fn update_cart_item(&self, ctx: &Context<'_>, product_id: ID, quantity: i32) -> FieldResult<CartPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let storage = context.storage.as_ref();
        let product_id = parse_id(&product_id)?;
        let cart = cart_session(ctx)?
            .resolve(storage, context.cart_ttl)
            .await
            .gql()?;

        if quantity <= 0 {
            if !storage.remove_cart_item(cart.id, product_id).await.gql()? {
                return Err(not_found("Cart item"));
            }
        } else if storage
            .set_cart_item_quantity(cart.id, product_id, quantity as u32)
            .await
            .gql()?
            .is_none()
        {
            return Err(not_found("Cart item"));
        }
        self.touched_cart(ctx, "update").await
    }

    async fn remove_from_cart(&self, ctx: &Context<'_>, product_id: ID) -> FieldResult<CartPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let storage = context.storage.as_ref();
        let product_id = parse_id(&product_id)?;
        let cart = cart_session(ctx)?
            .resolve(storage, context.cart_ttl)
            .await
            .gql()?;
        if !storage.remove_cart_item(cart.id, product_id).await.gql()? {
            return Err(not_found("Cart item"));
        }
        self.touched_cart(ctx, "remove").await
    }

    async fn clear_cart(&self, ctx: &Context<'_>) -> FieldResult<CartPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let storage = context.storage.as_ref();
        let cart = cart_session(ctx)?
            .resolve(storage, context.cart_ttl)
            .await
            .gql()?;
        storage.clear_cart(cart.id).await.gql()?;
        self.touched_cart(ctx, "clear").await
    }

    /// Place an order from the caller's cart and queue the confirmation e-mails
    async fn create_order(&self, ctx: &Context<'_>, input: OrderInput) -> FieldResult<OrderPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let session = cart_session(ctx)?;
        let client = ctx.data_opt::<ClientInfo>().cloned().unwrap_or_default();
        let (draft, totals) = input.into_draft(&client);

        let (order, items) = place_order(
            context.storage.as_ref(),
            session,
            context.cart_ttl,
            draft,
            totals,
            context.notifier.as_ref(),
        )
        .await
        .gql()?;

        Ok(OrderPayload {
            success: true,
            order: Some(Order {
                inner: order,
                items: Some(items),
            }),
        })
    }

    async fn update_order_status(&self, ctx: &Context<'_>, order_id: String, status: String) -> FieldResult<OrderPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let status = OrderStatus::parse(&status).gql()?;
        let order = context
            .storage
            .update_order_status(order_id.trim(), status)
            .await
            .gql()?
            .ok_or_else(|| not_found("Order"))?;
        info!("Order {} is now {}", order.order_id, order.status);
        Ok(OrderPayload {
            success: true,
            order: Some(order.into()),
        })
    }

    /// Update storefront texts; omitted or null arguments keep their value
    #[allow(clippy::too_many_arguments)]
    async fn update_site_content(
        &self,
        ctx: &Context<'_>,
        hero_title: Option<String>,
        hero_subtitle: Option<String>,
        hero_button_text: Option<String>,
        hero_button_url: Option<String>,
        about_title: Option<String>,
        about_subtitle: Option<String>,
        about_body: Option<String>,
    ) -> FieldResult<SiteContentPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let patch = SiteContentPatch {
            hero_title,
            hero_subtitle,
            hero_button_text,
            hero_button_url,
            about_title,
            about_subtitle,
            about_body,
        };
        let content = context.storage.update_site_content(patch).await.gql()?;
        Ok(SiteContentPayload {
            success: true,
            site_content: Some(content.into()),
        })
    }

    /// Set the merchant notification address; an empty string clears it
    async fn update_site_settings(&self, ctx: &Context<'_>, merchant_order_email: Option<String>) -> FieldResult<SiteSettingsPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        if let Some(email) = merchant_order_email.as_deref().map(str::trim) {
            if !email.is_empty() && !EmailAddress::is_valid(email) {
                return Err(validation("merchantOrderEmail is not a valid e-mail address"));
            }
        }
        let settings = context
            .storage
            .update_site_settings(SiteSettingsPatch { merchant_order_email })
            .await
            .gql()?;
        Ok(SiteSettingsPayload {
            success: true,
            site_settings: Some(settings.into()),
        })
    }

    /// Store a message from the contact form
    async fn create_contact_message(
        &self,
        ctx: &Context<'_>,
        name: String,
        email: Option<String>,
        phone: Option<String>,
        message: String,
    ) -> FieldResult<ContactMessagePayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(validation("name is required"));
        }
        check_len("name", &name, MAX_CONTACT_NAME).gql()?;
        if message.trim().is_empty() {
            return Err(validation("message is required"));
        }
        let email = optional_text(email);
        if let Some(email) = &email {
            if !EmailAddress::is_valid(email) {
                return Err(validation("email is not a valid e-mail address"));
            }
        }

        let stored = context
            .storage
            .create_contact_message(NewContactMessage {
                name,
                email,
                phone: optional_text(phone),
                message,
            })
            .await
            .gql()?;
        metrics::contact::received();
        info!("Contact message {} received", stored.id);
        Ok(ContactMessagePayload {
            success: true,
            contact_message: Some(stored.into()),
        })
    }

    async fn delete_contact_message(&self, ctx: &Context<'_>, id: ID) -> FieldResult<DeletePayload> {
        let context = ctx.data::<GraphQLContext>()?;
        if !context
            .storage
            .delete_contact_message(parse_id(&id)?)
            .await
            .gql()?
        {
            return Err(not_found("Contact message"));
        }
        Ok(DeletePayload { success: true })
    }

    async fn mark_contact_message_handled(
        &self,
        ctx: &Context<'_>,
        id: ID,
        #[graphql(default = true)] handled: bool,
    ) -> FieldResult<ContactMessagePayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let message = context
            .storage
            .set_contact_message_handled(parse_id(&id)?, handled)
            .await
            .gql()?
            .ok_or_else(|| not_found("Contact message"))?;
        Ok(ContactMessagePayload {
            success: true,
            contact_message: Some(message.into()),
        })
    }

    /// Create a category; the slug defaults to the slugified name
    async fn create_category(&self, ctx: &Context<'_>, name: String, slug: Option<String>) -> FieldResult<CategoryPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let name = name.trim().to_string();
        let slug = slugify(slug.as_deref().unwrap_or(&name));
        check_category(&name, &slug).gql()?;
        let category = context
            .storage
            .create_category(NewCategory { name, slug })
            .await
            .gql()?;
        Ok(CategoryPayload {
            success: true,
            category: Some(category.into()),
        })
    }

    /// Delete a category; its products stay, uncategorized
    async fn delete_category(&self, ctx: &Context<'_>, id: ID) -> FieldResult<DeletePayload> {
        let context = ctx.data::<GraphQLContext>()?;
        if !context.storage.delete_category(parse_id(&id)?).await.gql()? {
            return Err(not_found("Category"));
        }
        Ok(DeletePayload { success: true })
    }

    async fn create_product(&self, ctx: &Context<'_>, input: ProductInput) -> FieldResult<ProductPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let storage = context.storage.as_ref();
        let slug = match input.slug.as_deref().map(slugify) {
            Some(slug) if !slug.is_empty() => slug,
            _ => {
                let taken = taken_product_slugs(storage).await.gql()?;
                unique_slug(&slugify(&input.name), |s| taken.contains(s))
            }
        };
        let category_id = match &input.category_id {
            Some(id) => Some(existing_category(storage, id).await?),
            None => None,
        };
        let new_product = input.into_new_product(slug, category_id).gql()?;
        let product = storage.create_product(new_product).await.gql()?;
        info!("Created product {} ({})", product.name, product.slug);
        Ok(ProductPayload {
            success: true,
            product: Some(product.into()),
        })
    }

    async fn update_product(&self, ctx: &Context<'_>, id: ID, input: ProductUpdateInput) -> FieldResult<ProductPayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let storage = context.storage.as_ref();
        let category_id = match &input.category_id {
            MaybeUndefined::Undefined => None,
            MaybeUndefined::Null => Some(None),
            MaybeUndefined::Value(category) => Some(Some(existing_category(storage, category).await?)),
        };
        let patch = input.into_patch(category_id).gql()?;
        let product = storage
            .update_product(parse_id(&id)?, patch)
            .await
            .gql()?
            .ok_or_else(|| not_found("Product"))?;
        Ok(ProductPayload {
            success: true,
            product: Some(product.into()),
        })
    }

    /// Delete a product that no cart or order line references
    async fn delete_product(&self, ctx: &Context<'_>, id: ID) -> FieldResult<DeletePayload> {
        let context = ctx.data::<GraphQLContext>()?;
        if !context.storage.delete_product(parse_id(&id)?).await.gql()? {
            return Err(not_found("Product"));
        }
        Ok(DeletePayload { success: true })
    }

    /// Attach an already-stored image to a product's gallery
    async fn add_product_image(
        &self,
        ctx: &Context<'_>,
        product_id: ID,
        image: String,
        alt: Option<String>,
        ordering: Option<i32>,
    ) -> FieldResult<ProductImagePayload> {
        let context = ctx.data::<GraphQLContext>()?;
        let image = image.trim().to_string();
        if image.is_empty() {
            return Err(validation("image is required"));
        }
        let alt = alt.unwrap_or_default();
        check_len("alt", &alt, MAX_IMAGE_ALT).gql()?;
        let ordering = u32::try_from(ordering.unwrap_or(0))
            .map_err(|_| validation("ordering must not be negative"))?;

        let stored = context
            .storage
            .add_product_image(NewProductImage {
                product_id: parse_id(&product_id)?,
                image,
                alt,
                ordering,
            })
            .await
            .gql()?;
        Ok(ProductImagePayload {
            success: true,
            image: Some(stored.into()),
        })
    }

    async fn delete_product_image(&self, ctx: &Context<'_>, id: ID) -> FieldResult<DeletePayload> {
        let context = ctx.data::<GraphQLContext>()?;
        if !context
            .storage
            .delete_product_image(parse_id(&id)?)
            .await
            .gql()?
        {
            return Err(not_found("Product image"));
        }
        Ok(DeletePayload { success: true })
    }
}
