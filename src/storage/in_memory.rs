use super::Storage;
use crate::common::error::{Result, ShopError};
use crate::domain::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    next_id: i64,
    categories: BTreeMap<i64, Category>,
    products: BTreeMap<i64, Product>,
    product_images: BTreeMap<i64, ProductImage>,
    carts: BTreeMap<i64, Cart>,
    cart_items: BTreeMap<i64, CartItem>,
    orders: BTreeMap<i64, Order>,
    order_items: BTreeMap<i64, OrderItem>,
    contact_messages: BTreeMap<i64, ContactMessage>,
    site_content: Option<SiteContent>,
    site_settings: Option<SiteSettings>,
    admin_users: BTreeMap<i64, AdminUser>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product_referenced(&self, product_id: i64) -> bool {
        self.cart_items.values().any(|i| i.product_id == product_id)
            || self.order_items.values().any(|i| i.product_id == product_id)
    }
}

/// In-memory storage implementation for development/testing.
///
/// All tables sit behind one lock, so every operation is atomic.
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
        }
    }
}

fn sorted_by_name(mut products: Vec<Product>) -> Vec<Product> {
    products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    products
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let tables = self.tables.lock().unwrap();
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn get_categories_by_ids(&self, ids: Vec<i64>) -> Result<Vec<Category>> {
        let tables = self.tables.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| tables.categories.get(id).cloned())
            .collect())
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .categories
            .values()
            .any(|c| c.name == category.name || c.slug == category.slug)
        {
            return Err(ShopError::Conflict(format!(
                "Category '{}' already exists",
                category.name
            )));
        }
        let now = Utc::now();
        let id = tables.next_id();
        let created = Category {
            id,
            name: category.name,
            slug: category.slug,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(id, created.clone());
        debug!("Created category: {} with id {}", created.name, id);
        Ok(created)
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        if tables.categories.remove(&id).is_none() {
            return Ok(false);
        }
        let now = Utc::now();
        for product in tables.products.values_mut() {
            if product.category_id == Some(id) {
                product.category_id = None;
                product.updated_at = now;
            }
        }
        Ok(true)
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let tables = self.tables.lock().unwrap();
        let category_id = match filter.category_slug.as_deref() {
            Some(slug) => match tables.categories.values().find(|c| c.slug == slug) {
                Some(category) => Some(category.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let products = tables
            .products
            .values()
            .filter(|p| p.is_active == filter.is_active)
            .filter(|p| category_id.is_none() || p.category_id == category_id)
            .filter(|p| filter.matches_search(p))
            .cloned()
            .collect();
        Ok(sorted_by_name(products))
    }

    async fn list_products_in_category(&self, category_id: i64) -> Result<Vec<Product>> {
        let tables = self.tables.lock().unwrap();
        let products = tables
            .products
            .values()
            .filter(|p| p.category_id == Some(category_id))
            .cloned()
            .collect();
        Ok(sorted_by_name(products))
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.products.get(&id).cloned())
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.products.values().find(|p| p.slug == slug).cloned())
    }

    async fn get_products_by_ids(&self, ids: Vec<i64>) -> Result<Vec<Product>> {
        let tables = self.tables.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| tables.products.get(id).cloned())
            .collect())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let mut tables = self.tables.lock().unwrap();
        if tables.products.values().any(|p| p.slug == product.slug) {
            return Err(ShopError::Conflict(format!(
                "Product slug '{}' is already taken",
                product.slug
            )));
        }
        let now = Utc::now();
        let id = tables.next_id();
        let created = Product {
            id,
            name: product.name,
            slug: product.slug,
            description: product.description,
            price: product.price,
            image: product.image,
            category_id: product.category_id,
            sku: product.sku,
            ean: product.ean,
            ean_carton: product.ean_carton,
            neta: product.neta,
            vat: product.vat,
            stock_qty: product.stock_qty,
            is_active: product.is_active,
            only_for_rent: product.only_for_rent,
            created_at: now,
            updated_at: now,
        };
        tables.products.insert(id, created.clone());
        debug!("Created product: {} with id {}", created.name, id);
        Ok(created)
    }

    async fn update_product(&self, id: i64, patch: ProductPatch) -> Result<Option<Product>> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(slug) = patch.slug.as_deref() {
            if tables.products.values().any(|p| p.slug == slug && p.id != id) {
                return Err(ShopError::Conflict(format!(
                    "Product slug '{slug}' is already taken"
                )));
            }
        }
        let Some(product) = tables.products.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(product);
        product.updated_at = Utc::now();
        Ok(Some(product.clone()))
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.products.contains_key(&id) {
            return Ok(false);
        }
        if tables.product_referenced(id) {
            return Err(ShopError::Conflict(
                "Product is referenced by a cart or an order and cannot be deleted".to_string(),
            ));
        }
        tables.products.remove(&id);
        tables.product_images.retain(|_, img| img.product_id != id);
        Ok(true)
    }

    async fn add_product_image(&self, image: NewProductImage) -> Result<ProductImage> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.products.contains_key(&image.product_id) {
            return Err(ShopError::NotFound("Product not found".to_string()));
        }
        let now = Utc::now();
        let id = tables.next_id();
        let created = ProductImage {
            id,
            product_id: image.product_id,
            image: image.image,
            alt: image.alt,
            ordering: image.ordering,
            created_at: now,
            updated_at: now,
        };
        tables.product_images.insert(id, created.clone());
        Ok(created)
    }

    async fn delete_product_image(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.product_images.remove(&id).is_some())
    }

    async fn get_images_for_products(&self, product_ids: Vec<i64>) -> Result<Vec<ProductImage>> {
        let tables = self.tables.lock().unwrap();
        let mut images: Vec<ProductImage> = tables
            .product_images
            .values()
            .filter(|img| product_ids.contains(&img.product_id))
            .cloned()
            .collect();
        images.sort_by_key(|img| (img.product_id, img.ordering, img.id));
        Ok(images)
    }

    async fn create_cart(&self, expires_at: DateTime<Utc>) -> Result<Cart> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let id = tables.next_id();
        let cart = Cart {
            id,
            token: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            expires_at: Some(expires_at),
        };
        tables.carts.insert(id, cart.clone());
        debug!("Created cart {} with token {}", id, cart.token);
        Ok(cart)
    }

    async fn get_cart_by_token(&self, token: Uuid) -> Result<Option<Cart>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.carts.values().find(|c| c.token == token).cloned())
    }

    async fn touch_cart(&self, cart_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(cart) = tables.carts.get_mut(&cart_id) {
            cart.expires_at = Some(expires_at);
            cart.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_cart_items(&self, cart_id: i64) -> Result<Vec<CartItem>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .cart_items
            .values()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect())
    }

    async fn add_cart_item(
        &self,
        cart_id: i64,
        product_id: i64,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartItem> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        if let Some(item) = tables
            .cart_items
            .values_mut()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
        {
            item.quantity = merged_quantity(item.quantity, quantity)?;
            item.recalc();
            item.updated_at = now;
            return Ok(item.clone());
        }
        let quantity = merged_quantity(0, quantity)?;
        let id = tables.next_id();
        let mut item = CartItem {
            id,
            cart_id,
            product_id,
            quantity,
            unit_price_snapshot: unit_price,
            line_total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        item.recalc();
        tables.cart_items.insert(id, item.clone());
        Ok(item)
    }

    async fn set_cart_item_quantity(
        &self,
        cart_id: i64,
        product_id: i64,
        quantity: u32,
    ) -> Result<Option<CartItem>> {
        let quantity = merged_quantity(0, quantity)?;
        let mut tables = self.tables.lock().unwrap();
        let Some(item) = tables
            .cart_items
            .values_mut()
            .find(|i| i.cart_id == cart_id && i.product_id == product_id)
        else {
            return Ok(None);
        };
        item.quantity = quantity;
        item.recalc();
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn remove_cart_item(&self, cart_id: i64, product_id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.cart_items.len();
        tables
            .cart_items
            .retain(|_, i| !(i.cart_id == cart_id && i.product_id == product_id));
        Ok(tables.cart_items.len() < before)
    }

    async fn clear_cart(&self, cart_id: i64) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.cart_items.len();
        tables.cart_items.retain(|_, i| i.cart_id != cart_id);
        Ok((before - tables.cart_items.len()) as u64)
    }

    async fn purge_expired_carts(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().unwrap();
        let expired: Vec<i64> = tables
            .carts
            .values()
            .filter(|c| c.is_expired(now))
            .map(|c| c.id)
            .collect();
        for id in &expired {
            tables.carts.remove(id);
        }
        tables.cart_items.retain(|_, i| !expired.contains(&i.cart_id));
        Ok(expired.len() as u64)
    }

    async fn create_order_from_cart(
        &self,
        cart_id: i64,
        draft: &OrderDraft,
        order_id: &str,
    ) -> Result<(Order, Vec<OrderItem>)> {
        let mut tables = self.tables.lock().unwrap();
        let lines: Vec<CartItem> = tables
            .cart_items
            .values()
            .filter(|i| i.cart_id == cart_id)
            .cloned()
            .collect();
        if lines.is_empty() {
            return Err(ShopError::EmptyCart);
        }
        if tables.orders.values().any(|o| o.order_id == order_id) {
            return Err(ShopError::Conflict(format!("Order id {order_id} already exists")));
        }

        let (_, subtotal) = cart_totals(&lines);
        let now = Utc::now();
        let id = tables.next_id();
        let order = draft.clone().into_order(id, order_id.to_string(), subtotal, now);

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let name_snapshot = tables
                .products
                .get(&line.product_id)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            let item_id = tables.next_id();
            items.push(OrderItem {
                id: item_id,
                order_id: id,
                product_id: line.product_id,
                name_snapshot,
                unit_price_snapshot: line.unit_price_snapshot,
                quantity: line.quantity,
                line_total: line.line_total,
                created_at: now,
            });
        }

        tables.orders.insert(id, order.clone());
        for item in &items {
            tables.order_items.insert(item.id, item.clone());
        }
        tables.cart_items.retain(|_, i| i.cart_id != cart_id);
        Ok((order, items))
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.lock().unwrap();
        let mut orders: Vec<Order> = tables.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn get_order_by_order_id(&self, order_id: &str) -> Result<Option<Order>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.orders.values().find(|o| o.order_id == order_id).cloned())
    }

    async fn list_order_items(&self, order_row_id: i64) -> Result<Vec<OrderItem>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .order_items
            .values()
            .filter(|i| i.order_id == order_row_id)
            .cloned()
            .collect())
    }

    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> Result<Option<Order>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(order) = tables.orders.values_mut().find(|o| o.order_id == order_id) else {
            return Ok(None);
        };
        order.status = status;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    async fn create_contact_message(&self, message: NewContactMessage) -> Result<ContactMessage> {
        let mut tables = self.tables.lock().unwrap();
        let now = Utc::now();
        let id = tables.next_id();
        let created = ContactMessage {
            id,
            name: message.name,
            email: message.email,
            phone: message.phone,
            message: message.message,
            handled: false,
            created_at: now,
            updated_at: now,
        };
        tables.contact_messages.insert(id, created.clone());
        Ok(created)
    }

    async fn list_contact_messages(&self, limit: usize, offset: usize) -> Result<Vec<ContactMessage>> {
        let tables = self.tables.lock().unwrap();
        let mut messages: Vec<ContactMessage> = tables.contact_messages.values().cloned().collect();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(messages.into_iter().skip(offset).take(limit).collect())
    }

    async fn delete_contact_message(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.contact_messages.remove(&id).is_some())
    }

    async fn set_contact_message_handled(&self, id: i64, handled: bool) -> Result<Option<ContactMessage>> {
        let mut tables = self.tables.lock().unwrap();
        let Some(message) = tables.contact_messages.get_mut(&id) else {
            return Ok(None);
        };
        message.handled = handled;
        message.updated_at = Utc::now();
        Ok(Some(message.clone()))
    }

    async fn get_site_content(&self) -> Result<SiteContent> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .site_content
            .get_or_insert_with(|| SiteContent::empty(Utc::now()))
            .clone())
    }

    async fn update_site_content(&self, patch: SiteContentPatch) -> Result<SiteContent> {
        let mut tables = self.tables.lock().unwrap();
        let content = tables
            .site_content
            .get_or_insert_with(|| SiteContent::empty(Utc::now()));
        patch.apply(content);
        content.updated_at = Utc::now();
        Ok(content.clone())
    }

    async fn get_site_settings(&self) -> Result<SiteSettings> {
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .site_settings
            .get_or_insert_with(|| SiteSettings::empty(Utc::now()))
            .clone())
    }

    async fn update_site_settings(&self, patch: SiteSettingsPatch) -> Result<SiteSettings> {
        let mut tables = self.tables.lock().unwrap();
        let settings = tables
            .site_settings
            .get_or_insert_with(|| SiteSettings::empty(Utc::now()));
        patch.apply(settings);
        settings.updated_at = Utc::now();
        Ok(settings.clone())
    }

    async fn create_admin_user(&self, user: NewAdminUser) -> Result<AdminUser> {
        let mut tables = self.tables.lock().unwrap();
        if tables.admin_users.values().any(|u| {
            u.username == user.username || u.email.eq_ignore_ascii_case(&user.email)
        }) {
            return Err(ShopError::Conflict(format!(
                "User '{}' already exists",
                user.username
            )));
        }
        let id = tables.next_id();
        let created = AdminUser {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            is_staff: user.is_staff,
            is_superuser: user.is_superuser,
            created_at: Utc::now(),
        };
        tables.admin_users.insert(id, created.clone());
        Ok(created)
    }

    async fn get_admin_user_by_email(&self, email: &str) -> Result<Option<AdminUser>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .admin_users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}
