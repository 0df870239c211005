mod in_memory;
mod sqlite;

pub use in_memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

use crate::common::error::Result;
use crate::domain::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Storage trait for the shop's relational data (catalog, carts, orders, content, inbox, staff)
#[async_trait]
pub trait Storage: Send + Sync {
    // Category operations
    async fn list_categories(&self) -> Result<Vec<Category>>;
    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>>;
    async fn get_categories_by_ids(&self, ids: Vec<i64>) -> Result<Vec<Category>>;
    async fn create_category(&self, category: NewCategory) -> Result<Category>;
    async fn delete_category(&self, id: i64) -> Result<bool>;

    // Product operations
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;
    async fn list_products_in_category(&self, category_id: i64) -> Result<Vec<Product>>;
    async fn get_product(&self, id: i64) -> Result<Option<Product>>;
    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>>;
    async fn get_products_by_ids(&self, ids: Vec<i64>) -> Result<Vec<Product>>;
    async fn create_product(&self, product: NewProduct) -> Result<Product>;
    async fn update_product(&self, id: i64, patch: ProductPatch) -> Result<Option<Product>>;
    async fn delete_product(&self, id: i64) -> Result<bool>;

    // Product image operations
    async fn add_product_image(&self, image: NewProductImage) -> Result<ProductImage>;
    async fn delete_product_image(&self, id: i64) -> Result<bool>;
    async fn get_images_for_products(&self, product_ids: Vec<i64>) -> Result<Vec<ProductImage>>;

    // Cart operations
    async fn create_cart(&self, expires_at: DateTime<Utc>) -> Result<Cart>;
    async fn get_cart_by_token(&self, token: Uuid) -> Result<Option<Cart>>;
    async fn touch_cart(&self, cart_id: i64, expires_at: DateTime<Utc>) -> Result<()>;
    async fn list_cart_items(&self, cart_id: i64) -> Result<Vec<CartItem>>;
    /// Add `quantity` of a product, merging into the existing line for that product.
    async fn add_cart_item(
        &self,
        cart_id: i64,
        product_id: i64,
        quantity: u32,
        unit_price: rust_decimal::Decimal,
    ) -> Result<CartItem>;
    async fn set_cart_item_quantity(
        &self,
        cart_id: i64,
        product_id: i64,
        quantity: u32,
    ) -> Result<Option<CartItem>>;
    async fn remove_cart_item(&self, cart_id: i64, product_id: i64) -> Result<bool>;
    async fn clear_cart(&self, cart_id: i64) -> Result<u64>;
    async fn purge_expired_carts(&self, now: DateTime<Utc>) -> Result<u64>;

    // Order operations
    /// Snapshot the cart into a new order and empty the cart, atomically.
    async fn create_order_from_cart(
        &self,
        cart_id: i64,
        draft: &OrderDraft,
        order_id: &str,
    ) -> Result<(Order, Vec<OrderItem>)>;
    async fn list_orders(&self) -> Result<Vec<Order>>;
    async fn get_order_by_order_id(&self, order_id: &str) -> Result<Option<Order>>;
    async fn list_order_items(&self, order_row_id: i64) -> Result<Vec<OrderItem>>;
    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> Result<Option<Order>>;

    // Contact inbox operations
    async fn create_contact_message(&self, message: NewContactMessage) -> Result<ContactMessage>;
    async fn list_contact_messages(&self, limit: usize, offset: usize) -> Result<Vec<ContactMessage>>;
    async fn delete_contact_message(&self, id: i64) -> Result<bool>;
    async fn set_contact_message_handled(&self, id: i64, handled: bool) -> Result<Option<ContactMessage>>;

    // Site content and settings singletons
    async fn get_site_content(&self) -> Result<SiteContent>;
    async fn update_site_content(&self, patch: SiteContentPatch) -> Result<SiteContent>;
    async fn get_site_settings(&self) -> Result<SiteSettings>;
    async fn update_site_settings(&self, patch: SiteSettingsPatch) -> Result<SiteSettings>;

    // Staff accounts
    async fn create_admin_user(&self, user: NewAdminUser) -> Result<AdminUser>;
    async fn get_admin_user_by_email(&self, email: &str) -> Result<Option<AdminUser>>;
}
