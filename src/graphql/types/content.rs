use crate::domain::{SiteContent as DomainSiteContent, SiteSettings as DomainSiteSettings};
use crate::graphql::schema::GraphQLContext;
use async_graphql::{Context, FieldResult, Object, SimpleObject, ID};
use chrono::{DateTime, Utc};

/// GraphQL representation of the SiteContent singleton
#[derive(Clone)]
pub struct SiteContent {
    pub inner: DomainSiteContent,
}

impl From<DomainSiteContent> for SiteContent {
    fn from(content: DomainSiteContent) -> Self {
        Self { inner: content }
    }
}

#[Object]
impl SiteContent {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    async fn hero_title(&self) -> &str {
        &self.inner.hero_title
    }

    async fn hero_subtitle(&self) -> &str {
        &self.inner.hero_subtitle
    }

    async fn hero_image(&self) -> Option<&str> {
        self.inner.hero_image.as_deref()
    }

    async fn hero_image_url(&self, ctx: &Context<'_>) -> FieldResult<Option<String>> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.media.url(self.inner.hero_image.as_deref()))
    }

    async fn hero_button_text(&self) -> &str {
        &self.inner.hero_button_text
    }

    async fn hero_button_url(&self) -> &str {
        &self.inner.hero_button_url
    }

    async fn about_title(&self) -> &str {
        &self.inner.about_title
    }

    async fn about_subtitle(&self) -> &str {
        &self.inner.about_subtitle
    }

    async fn about_body(&self) -> &str {
        &self.inner.about_body
    }

    async fn about_image_url(&self, ctx: &Context<'_>) -> FieldResult<Option<String>> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.media.url(self.inner.about_image.as_deref()))
    }

    async fn webshop_image_url(&self, ctx: &Context<'_>) -> FieldResult<Option<String>> {
        let context = ctx.data::<GraphQLContext>()?;
        Ok(context.media.url(self.inner.webshop_image.as_deref()))
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }
}

/// GraphQL representation of the SiteSettings singleton
#[derive(Clone)]
pub struct SiteSettings {
    pub inner: DomainSiteSettings,
}

impl From<DomainSiteSettings> for SiteSettings {
    fn from(settings: DomainSiteSettings) -> Self {
        Self { inner: settings }
    }
}

#[Object]
impl SiteSettings {
    async fn id(&self) -> ID {
        ID(self.inner.id.to_string())
    }

    /// Recipient of new-order notifications
    async fn merchant_order_email(&self) -> Option<&str> {
        self.inner.merchant_order_email.as_deref()
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.inner.updated_at
    }
}

#[derive(SimpleObject)]
pub struct SiteContentPayload {
    pub success: bool,
    pub site_content: Option<SiteContent>,
}

#[derive(SimpleObject)]
pub struct SiteSettingsPayload {
    pub success: bool,
    pub site_settings: Option<SiteSettings>,
}
