use crate::common::constants::{MAX_CATEGORY_NAME, MAX_CATEGORY_SLUG, MAX_PRODUCT_NAME, MAX_PRODUCT_SLUG};
use crate::common::error::{Result, ShopError};
use crate::domain::{
    Category as DomainCategory, NewProduct, Product as DomainProduct,
    ProductImage as DomainProductImage, ProductPatch, DEFAULT_VAT_PERCENT,
};
use crate::graphql::schema::GraphQLContext;
use crate::graphql::GqlResultExt;
use async_graphql::{Context, FieldResult, InputObject, MaybeUndefined, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// GraphQL representation of a Category
#[derive(Clone)]
pub struct Category {
    pub inner: DomainCategory,
}

impl From<DomainCategory> for Category {
    fn from(category: DomainCategory) -> Self {
        Self { inner: category }
    }
}

#[Object]
impl Category {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.inner.name
    }

    async fn slug(&self) -> &str {
        &self.inner.slug
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }

    /// Every product filed under this category, active or not
    async fn products(&self, ctx: &Context<'_>) -> FieldResult<Vec<Product>> {
        let context = ctx.data::<GraphQLContext>()?;
        let products = context
            .storage
            .list_products_in_category(self.inner.id)
            .await
            .gql()?;
        Ok(products.into_iter().map(Product::from).collect())
    }
}

/// GraphQL representation of a Product
#[derive(Clone)]
pub struct Product {
    pub inner: DomainProduct,
}

impl From<DomainProduct> for Product {
    fn from(product: DomainProduct) -> Self {
        Self { inner: product }
    }
}

#[Object]
impl Product {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn name(&self) -> &str {
        &self.inner.name
    }

    async fn slug(&self) -> &str {
        &self.inner.slug
    }

    async fn description(&self) -> &str {
        &self.inner.description
    }

    /// Gross unit price in HUF
    async fn price(&self) -> Decimal {
        self.inner.price
    }

    /// Stored media path of the main image
    async fn image(&self) -> Option<&str> {
        self.inner.image.as_deref()
    }

    /// Absolute URL of the main image
    async fn image_url(&self, ctx: &Context<'_>) -> FieldResult<Option<String>> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.media.url(self.inner.image.as_deref()))
    }

    async fn category(&self, ctx: &Context<'_>) -> FieldResult<Option<Category>> {
        let Some(category_id) = self.inner.category_id else {
            return Ok(None);
        };
        let context = ctx.data::<GraphQLContext>()?;
        let category = context.category_loader.load_one(category_id).await?;
        Ok(category.map(Category::from))
    }

    async fn sku(&self) -> &str {
        &self.inner.sku
    }

    async fn ean(&self) -> &str {
        &self.inner.ean
    }

    async fn ean_carton(&self) -> &str {
        &self.inner.ean_carton
    }

    /// Net price
    async fn neta(&self) -> Decimal {
        self.inner.neta
    }

    /// VAT percentage
    async fn vat(&self) -> Decimal {
        self.inner.vat
    }

    async fn stock_qty(&self) -> u32 {
        self.inner.stock_qty
    }

    async fn is_active(&self) -> bool {
        self.inner.is_active
    }

    async fn only_for_rent(&self) -> bool {
        self.inner.only_for_rent
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }

    /// Gallery images ordered by `ordering`
    async fn images(&self, ctx: &Context<'_>) -> FieldResult<Vec<ProductImage>> {
        let context = ctx.data::<GraphQLContext>()?;
        let images = context
            .images_loader
            .load_one(self.inner.id)
            .await?
            .unwrap_or_default();
        Ok(images.into_iter().map(ProductImage::from).collect())
    }
}

/// GraphQL representation of a ProductImage
#[derive(Clone)]
pub struct ProductImage {
    pub inner: DomainProductImage,
}

impl From<DomainProductImage> for ProductImage {
    fn from(image: DomainProductImage) -> Self {
        Self { inner: image }
    }
}

#[Object]
impl ProductImage {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn image(&self) -> &str {
        &self.inner.image
    }

    async fn image_url(&self, ctx: &Context<'_>) -> FieldResult<Option<String>> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.media.url(Some(&self.inner.image)))
    }

    async fn alt(&self) -> &str {
        &self.inner.alt
    }

    async fn ordering(&self) -> u32 {
        self.inner.ordering
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.inner.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }
}

pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(ShopError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub(crate) fn check_category(name: &str, slug: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ShopError::Validation("name is required".to_string()));
    }
    if slug.is_empty() {
        return Err(ShopError::Validation("slug must contain letters or digits".to_string()));
    }
    check_len("name", name, MAX_CATEGORY_NAME)?;
    check_len("slug", slug, MAX_CATEGORY_SLUG)
}

fn non_negative(field: &str, value: Decimal) -> Result<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ShopError::Validation(format!("{field} must not be negative")));
    }
    Ok(value)
}

fn stock(value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ShopError::Validation("stockQty must not be negative".to_string()))
}

#[derive(InputObject)]
pub struct ProductInput {
    pub name: String,
    /// Derived from the name when omitted
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub category_id: Option<ID>,
    pub sku: Option<String>,
    pub ean: Option<String>,
    pub ean_carton: Option<String>,
    pub neta: Option<Decimal>,
    pub vat: Option<Decimal>,
    pub stock_qty: Option<i32>,
    pub is_active: Option<bool>,
    pub only_for_rent: Option<bool>,
}

impl ProductInput {
    /// Validate and build the row; `slug` and `category_id` are already resolved.
    pub fn into_new_product(self, slug: String, category_id: Option<i64>) -> Result<NewProduct> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ShopError::Validation("name is required".to_string()));
        }
        if slug.is_empty() {
            return Err(ShopError::Validation("slug must contain letters or digits".to_string()));
        }
        check_len("name", &name, MAX_PRODUCT_NAME)?;
        check_len("slug", &slug, MAX_PRODUCT_SLUG)?;

        Ok(NewProduct {
            name,
            slug,
            description: self.description.unwrap_or_default(),
            price: non_negative("price", self.price)?,
            image: self.image.filter(|i| !i.trim().is_empty()),
            category_id,
            sku: self.sku.unwrap_or_default(),
            ean: self.ean.unwrap_or_default(),
            ean_carton: self.ean_carton.unwrap_or_default(),
            neta: non_negative("neta", self.neta.unwrap_or_default())?,
            vat: non_negative("vat", self.vat.unwrap_or(DEFAULT_VAT_PERCENT))?,
            stock_qty: stock(self.stock_qty.unwrap_or(0))?,
            is_active: self.is_active.unwrap_or(true),
            only_for_rent: self.only_for_rent.unwrap_or(false),
        })
    }
}

/// Partial product update; `image: null` and `categoryId: null` clear the field.
#[derive(InputObject, Default)]
pub struct ProductUpdateInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub image: MaybeUndefined<String>,
    pub category_id: MaybeUndefined<ID>,
    pub sku: Option<String>,
    pub ean: Option<String>,
    pub ean_carton: Option<String>,
    pub neta: Option<Decimal>,
    pub vat: Option<Decimal>,
    pub stock_qty: Option<i32>,
    pub is_active: Option<bool>,
    pub only_for_rent: Option<bool>,
}

impl ProductUpdateInput {
    /// `category_id` is the already-parsed form of the `categoryId` argument.
    pub fn into_patch(self, category_id: Option<Option<i64>>) -> Result<ProductPatch> {
        let name = match self.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(ShopError::Validation("name must not be blank".to_string()));
                }
                check_len("name", &name, MAX_PRODUCT_NAME)?;
                Some(name)
            }
            None => None,
        };
        let slug = match self.slug {
            Some(slug) => {
                let slug = crate::slug::slugify(&slug);
                if slug.is_empty() {
                    return Err(ShopError::Validation(
                        "slug must contain letters or digits".to_string(),
                    ));
                }
                check_len("slug", &slug, MAX_PRODUCT_SLUG)?;
                Some(slug)
            }
            None => None,
        };
        let image = match self.image {
            MaybeUndefined::Undefined => None,
            MaybeUndefined::Null => Some(None),
            MaybeUndefined::Value(image) => {
                Some(Some(image).filter(|i| !i.trim().is_empty()))
            }
        };

        Ok(ProductPatch {
            name,
            slug,
            description: self.description,
            price: self.price.map(|p| non_negative("price", p)).transpose()?,
            image,
            category_id,
            sku: self.sku,
            ean: self.ean,
            ean_carton: self.ean_carton,
            neta: self.neta.map(|n| non_negative("neta", n)).transpose()?,
            vat: self.vat.map(|v| non_negative("vat", v)).transpose()?,
            stock_qty: self.stock_qty.map(stock).transpose()?,
            is_active: self.is_active,
            only_for_rent: self.only_for_rent,
        })
    }
}

#[derive(SimpleObject)]
pub struct CategoryPayload {
    pub success: bool,
    pub category: Option<Category>,
}

#[derive(SimpleObject)]
pub struct ProductPayload {
    pub success: bool,
    pub product: Option<Product>,
}

#[derive(SimpleObject)]
pub struct ProductImagePayload {
    pub success: bool,
    pub image: Option<ProductImage>,
}

/// Result of a delete mutation
#[derive(SimpleObject)]
pub struct DeletePayload {
    pub success: bool,
}
