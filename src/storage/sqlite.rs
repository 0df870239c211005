use super::Storage;
use crate::common::error::{Result, ShopError};
use crate::domain::*;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;

const CATEGORY_COLUMNS: &str = "id, name, slug, created_at, updated_at";
const PRODUCT_COLUMNS: &str = "p.id, p.name, p.slug, p.description, p.price, p.image, p.category_id, \
     p.sku, p.ean, p.ean_carton, p.neta, p.vat, p.stock_qty, p.is_active, p.only_for_rent, \
     p.created_at, p.updated_at";
const IMAGE_COLUMNS: &str = "id, product_id, image, alt, ordering, created_at, updated_at";
const CART_COLUMNS: &str = "id, token, created_at, updated_at, expires_at";
const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, unit_price_snapshot, line_total, \
     created_at, updated_at";
const ORDER_COLUMNS: &str = "id, order_id, customer_name, customer_email, customer_phone, \
     shipping_address, shipping_city, shipping_zip, delivery_notes, preferred_delivery_time, status, \
     subtotal, discount_total, shipping_fee, grand_total, placed_ip, placed_user_agent, created_at, \
     updated_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, name_snapshot, unit_price_snapshot, \
     quantity, line_total, created_at";
const CONTACT_COLUMNS: &str = "id, name, email, phone, message, handled, created_at, updated_at";
const SITE_CONTENT_COLUMNS: &str = "id, hero_image, hero_title, hero_subtitle, hero_button_text, \
     hero_button_url, about_image, about_title, about_subtitle, about_body, webshop_image, created_at, \
     updated_at";
const SITE_SETTINGS_COLUMNS: &str = "id, merchant_order_email, created_at, updated_at";
const ADMIN_USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, is_staff, \
     is_superuser, created_at";

/// RFC 3339 with fixed precision so TEXT comparison orders chronologically.
fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn get_decimal(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn get_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn get_u32(row: &Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let raw: i64 = row.get(idx)?;
    u32::try_from(raw).map_err(|e| conversion_error(idx, e))
}

fn row_to_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        created_at: get_timestamp(row, 3)?,
        updated_at: get_timestamp(row, 4)?,
    })
}

fn row_to_product(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        price: get_decimal(row, 4)?,
        image: row.get(5)?,
        category_id: row.get(6)?,
        sku: row.get(7)?,
        ean: row.get(8)?,
        ean_carton: row.get(9)?,
        neta: get_decimal(row, 10)?,
        vat: get_decimal(row, 11)?,
        stock_qty: get_u32(row, 12)?,
        is_active: row.get(13)?,
        only_for_rent: row.get(14)?,
        created_at: get_timestamp(row, 15)?,
        updated_at: get_timestamp(row, 16)?,
    })
}

fn row_to_image(row: &Row<'_>) -> rusqlite::Result<ProductImage> {
    Ok(ProductImage {
        id: row.get(0)?,
        product_id: row.get(1)?,
        image: row.get(2)?,
        alt: row.get(3)?,
        ordering: get_u32(row, 4)?,
        created_at: get_timestamp(row, 5)?,
        updated_at: get_timestamp(row, 6)?,
    })
}

fn row_to_cart(row: &Row<'_>) -> rusqlite::Result<Cart> {
    let token: String = row.get(1)?;
    Ok(Cart {
        id: row.get(0)?,
        token: Uuid::parse_str(&token).map_err(|e| conversion_error(1, e))?,
        created_at: get_timestamp(row, 2)?,
        updated_at: get_timestamp(row, 3)?,
        expires_at: get_opt_timestamp(row, 4)?,
    })
}

fn row_to_cart_item(row: &Row<'_>) -> rusqlite::Result<CartItem> {
    Ok(CartItem {
        id: row.get(0)?,
        cart_id: row.get(1)?,
        product_id: row.get(2)?,
        quantity: get_u32(row, 3)?,
        unit_price_snapshot: get_decimal(row, 4)?,
        line_total: get_decimal(row, 5)?,
        created_at: get_timestamp(row, 6)?,
        updated_at: get_timestamp(row, 7)?,
    })
}

fn row_to_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    let status: String = row.get(10)?;
    Ok(Order {
        id: row.get(0)?,
        order_id: row.get(1)?,
        customer_name: row.get(2)?,
        customer_email: row.get(3)?,
        customer_phone: row.get(4)?,
        shipping_address: row.get(5)?,
        shipping_city: row.get(6)?,
        shipping_zip: row.get(7)?,
        delivery_notes: row.get(8)?,
        preferred_delivery_time: row.get(9)?,
        status: OrderStatus::parse(&status).map_err(|e| conversion_error(10, e))?,
        subtotal: get_decimal(row, 11)?,
        discount_total: get_decimal(row, 12)?,
        shipping_fee: get_decimal(row, 13)?,
        grand_total: get_decimal(row, 14)?,
        placed_ip: row.get(15)?,
        placed_user_agent: row.get(16)?,
        created_at: get_timestamp(row, 17)?,
        updated_at: get_timestamp(row, 18)?,
    })
}

fn row_to_order_item(row: &Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        id: row.get(0)?,
        order_id: row.get(1)?,
        product_id: row.get(2)?,
        name_snapshot: row.get(3)?,
        unit_price_snapshot: get_decimal(row, 4)?,
        quantity: get_u32(row, 5)?,
        line_total: get_decimal(row, 6)?,
        created_at: get_timestamp(row, 7)?,
    })
}

fn row_to_contact(row: &Row<'_>) -> rusqlite::Result<ContactMessage> {
    Ok(ContactMessage {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        message: row.get(4)?,
        handled: row.get(5)?,
        created_at: get_timestamp(row, 6)?,
        updated_at: get_timestamp(row, 7)?,
    })
}

fn row_to_site_content(row: &Row<'_>) -> rusqlite::Result<SiteContent> {
    Ok(SiteContent {
        id: row.get(0)?,
        hero_image: row.get(1)?,
        hero_title: row.get(2)?,
        hero_subtitle: row.get(3)?,
        hero_button_text: row.get(4)?,
        hero_button_url: row.get(5)?,
        about_image: row.get(6)?,
        about_title: row.get(7)?,
        about_subtitle: row.get(8)?,
        about_body: row.get(9)?,
        webshop_image: row.get(10)?,
        created_at: get_timestamp(row, 11)?,
        updated_at: get_timestamp(row, 12)?,
    })
}

fn row_to_site_settings(row: &Row<'_>) -> rusqlite::Result<SiteSettings> {
    Ok(SiteSettings {
        id: row.get(0)?,
        merchant_order_email: row.get(1)?,
        created_at: get_timestamp(row, 2)?,
        updated_at: get_timestamp(row, 3)?,
    })
}

fn row_to_admin_user(row: &Row<'_>) -> rusqlite::Result<AdminUser> {
    Ok(AdminUser {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        is_staff: row.get(6)?,
        is_superuser: row.get(7)?,
        created_at: get_timestamp(row, 8)?,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Wrap a rusqlite error with context, in the shape every query below reports.
fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> ShopError {
    move |e| ShopError::database(format!("{context}: {e}"))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// SQLite storage over a single connection; the mutex serializes writers the way a
/// row lock would. Queries run on the blocking pool, never on a runtime worker.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (creating if needed) the database file at `path` and apply migrations.
    pub fn connect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening SQLite database at {}", path.display());
        let conn = Connection::open(path).map_err(db_err("Failed to open database"))?;
        let storage = Self::from_connection(conn)?;
        storage.run_migrations()?;
        Ok(storage)
    }

    /// Private in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("Failed to open database"))?;
        let storage = Self::from_connection(conn)?;
        storage.run_migrations()?;
        Ok(storage)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(db_err("Failed to configure connection"))?;
        // WAL is refused by in-memory databases; the returned mode is irrelevant.
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0));
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run database migrations
    pub fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        let conn = self.conn();

        let migration_sql_001 = include_str!("../../migrations/001_initial_schema.sql");
        conn.execute_batch(migration_sql_001)
            .map_err(db_err("Failed to run base migration"))?;

        let migration_sql_002 = include_str!("../../migrations/002_indexes.sql");
        conn.execute_batch(migration_sql_002)
            .map_err(db_err("Failed to run index migration"))?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    /// Run `f` against the connection on tokio's blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap();
            f(&mut *guard)
        })
        .await
        .map_err(|e| ShopError::database(format!("Database task failed: {e}")))?
    }

    fn product_by_id(conn: &Connection, id: i64) -> Result<Option<Product>> {
        conn.query_row(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ?1"),
            params![id],
            row_to_product,
        )
        .optional()
        .map_err(db_err("Failed to query product"))
    }

    fn cart_item(conn: &Connection, cart_id: i64, product_id: i64) -> Result<Option<CartItem>> {
        conn.query_row(
            &format!("SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = ?1 AND product_id = ?2"),
            params![cart_id, product_id],
            row_to_cart_item,
        )
        .optional()
        .map_err(db_err("Failed to query cart item"))
    }

    fn cart_items(conn: &Connection, cart_id: i64) -> Result<Vec<CartItem>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = ?1 ORDER BY id"
            ))
            .map_err(db_err("Failed to prepare cart item query"))?;
        let rows = stmt
            .query_map(params![cart_id], row_to_cart_item)
            .map_err(db_err("Failed to query cart items"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Failed to read cart item"))
    }

    fn order_by_order_id(conn: &Connection, order_id: &str) -> Result<Option<Order>> {
        conn.query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
            params![order_id],
            row_to_order,
        )
        .optional()
        .map_err(db_err("Failed to query order"))
    }

    fn contact_by_id(conn: &Connection, id: i64) -> Result<Option<ContactMessage>> {
        conn.query_row(
            &format!("SELECT {CONTACT_COLUMNS} FROM contact_messages WHERE id = ?1"),
            params![id],
            row_to_contact,
        )
        .optional()
        .map_err(db_err("Failed to query contact message"))
    }

    fn site_content(conn: &Connection) -> Result<SiteContent> {
        let now = ts(Utc::now());
        conn.execute(
            "INSERT OR IGNORE INTO site_content (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![SINGLETON_ID, now],
        )
        .map_err(db_err("Failed to create site content"))?;
        conn.query_row(
            &format!("SELECT {SITE_CONTENT_COLUMNS} FROM site_content WHERE id = ?1"),
            params![SINGLETON_ID],
            row_to_site_content,
        )
        .map_err(db_err("Failed to query site content"))
    }

    fn site_settings(conn: &Connection) -> Result<SiteSettings> {
        let now = ts(Utc::now());
        conn.execute(
            "INSERT OR IGNORE INTO site_settings (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![SINGLETON_ID, now],
        )
        .map_err(db_err("Failed to create site settings"))?;
        conn.query_row(
            &format!("SELECT {SITE_SETTINGS_COLUMNS} FROM site_settings WHERE id = ?1"),
            params![SINGLETON_ID],
            row_to_site_settings,
        )
        .map_err(db_err("Failed to query site settings"))
    }

    fn query_products(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Product>> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(db_err("Failed to prepare product query"))?;
        let rows = stmt
            .query_map(args, row_to_product)
            .map_err(db_err("Failed to query products"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Failed to read product"))
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"))
                .map_err(db_err("Failed to prepare category query"))?;
            let rows = stmt
                .query_map([], row_to_category)
                .map_err(db_err("Failed to query categories"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Failed to read category"))
        })
        .await
    }

    async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let slug = slug.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = ?1"),
                params![slug],
                row_to_category,
            )
            .optional()
            .map_err(db_err("Failed to query category"))
        })
        .await
    }

    async fn get_categories_by_ids(&self, ids: Vec<i64>) -> Result<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.run(move |conn| {
            let sql = format!(
                "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(db_err("Failed to prepare category query"))?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), row_to_category)
                .map_err(db_err("Failed to query categories"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Failed to read category"))
        })
        .await
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        self.run(move |conn| {
            let now = ts(Utc::now());
            conn.execute(
                "INSERT INTO categories (name, slug, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![category.name, category.slug, now],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ShopError::Conflict(format!("Category '{}' already exists", category.name))
                } else {
                    ShopError::database(format!("Failed to insert category: {e}"))
                }
            })?;
            let id = conn.last_insert_rowid();
            debug!("Created category: {} with id {}", category.name, id);
            conn.query_row(
                &format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"),
                params![id],
                row_to_category,
            )
            .map_err(db_err("Failed to reload category"))
        })
        .await
    }

    async fn delete_category(&self, id: i64) -> Result<bool> {
        self.run(move |conn| {
            let deleted = conn
                .execute("DELETE FROM categories WHERE id = ?1", params![id])
                .map_err(db_err("Failed to delete category"))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let filter = filter.clone();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p LEFT JOIN categories c ON c.id = p.category_id \
                 WHERE p.is_active = ?1 AND (?2 IS NULL OR c.slug = ?2) ORDER BY p.name, p.id"
            );
            let products = Self::query_products(conn, &sql, &[&filter.is_active, &filter.category_slug])?;
            // Search runs here rather than in SQL: SQLite's lower() only folds ASCII.
            Ok(products
                .into_iter()
                .filter(|p| filter.matches_search(p))
                .collect())
        })
        .await
    }

    async fn list_products_in_category(&self, category_id: i64) -> Result<Vec<Product>> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.category_id = ?1 ORDER BY p.name, p.id"
            );
            Self::query_products(conn, &sql, &[&category_id])
        })
        .await
    }

    async fn get_product(&self, id: i64) -> Result<Option<Product>> {
        self.run(move |conn| Self::product_by_id(conn, id)).await
    }

    async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let slug = slug.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.slug = ?1"),
                params![slug],
                row_to_product,
            )
            .optional()
            .map_err(db_err("Failed to query product"))
        })
        .await
    }

    async fn get_products_by_ids(&self, ids: Vec<i64>) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.run(move |conn| {
            let sql = format!(
                "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id IN ({})",
                placeholders(ids.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(db_err("Failed to prepare product query"))?;
            let rows = stmt
                .query_map(params_from_iter(ids.iter()), row_to_product)
                .map_err(db_err("Failed to query products"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Failed to read product"))
        })
        .await
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        self.run(move |conn| {
            let now = ts(Utc::now());
            conn.execute(
                "INSERT INTO products (name, slug, description, price, image, category_id, sku, ean, \
                 ean_carton, neta, vat, stock_qty, is_active, only_for_rent, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
                params![
                    product.name,
                    product.slug,
                    product.description,
                    product.price.to_string(),
                    product.image,
                    product.category_id,
                    product.sku,
                    product.ean,
                    product.ean_carton,
                    product.neta.to_string(),
                    product.vat.to_string(),
                    product.stock_qty as i64,
                    product.is_active,
                    product.only_for_rent,
                    now,
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ShopError::Conflict(format!("Product slug '{}' is already taken", product.slug))
                } else {
                    ShopError::database(format!("Failed to insert product: {e}"))
                }
            })?;
            let id = conn.last_insert_rowid();
            debug!("Created product: {} with id {}", product.name, id);
            Self::product_by_id(conn, id)?
                .ok_or_else(|| ShopError::database("Inserted product disappeared"))
        })
        .await
    }

    async fn update_product(&self, id: i64, patch: ProductPatch) -> Result<Option<Product>> {
        self.run(move |conn| {
            let Some(mut product) = Self::product_by_id(conn, id)? else {
                return Ok(None);
            };
            patch.apply(&mut product);
            product.updated_at = Utc::now();
            conn.execute(
                "UPDATE products SET name = ?2, slug = ?3, description = ?4, price = ?5, image = ?6, \
                 category_id = ?7, sku = ?8, ean = ?9, ean_carton = ?10, neta = ?11, vat = ?12, \
                 stock_qty = ?13, is_active = ?14, only_for_rent = ?15, updated_at = ?16 WHERE id = ?1",
                params![
                    id,
                    product.name,
                    product.slug,
                    product.description,
                    product.price.to_string(),
                    product.image,
                    product.category_id,
                    product.sku,
                    product.ean,
                    product.ean_carton,
                    product.neta.to_string(),
                    product.vat.to_string(),
                    product.stock_qty as i64,
                    product.is_active,
                    product.only_for_rent,
                    ts(product.updated_at),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ShopError::Conflict(format!("Product slug '{}' is already taken", product.slug))
                } else {
                    ShopError::database(format!("Failed to update product: {e}"))
                }
            })?;
            Ok(Some(product))
        })
        .await
    }

    async fn delete_product(&self, id: i64) -> Result<bool> {
        self.run(move |conn| {
            let referenced: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM cart_items WHERE product_id = ?1) \
                     OR EXISTS(SELECT 1 FROM order_items WHERE product_id = ?1)",
                    params![id],
                    |row| row.get(0),
                )
                .map_err(db_err("Failed to check product references"))?;
            if referenced {
                return Err(ShopError::Conflict(
                    "Product is referenced by a cart or an order and cannot be deleted".to_string(),
                ));
            }
            let deleted = conn
                .execute("DELETE FROM products WHERE id = ?1", params![id])
                .map_err(db_err("Failed to delete product"))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn add_product_image(&self, image: NewProductImage) -> Result<ProductImage> {
        self.run(move |conn| {
            if Self::product_by_id(conn, image.product_id)?.is_none() {
                return Err(ShopError::NotFound("Product not found".to_string()));
            }
            let now = ts(Utc::now());
            conn.execute(
                "INSERT INTO product_images (product_id, image, alt, ordering, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![image.product_id, image.image, image.alt, image.ordering as i64, now],
            )
            .map_err(db_err("Failed to insert product image"))?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {IMAGE_COLUMNS} FROM product_images WHERE id = ?1"),
                params![id],
                row_to_image,
            )
            .map_err(db_err("Failed to reload product image"))
        })
        .await
    }

    async fn delete_product_image(&self, id: i64) -> Result<bool> {
        self.run(move |conn| {
            let deleted = conn
                .execute("DELETE FROM product_images WHERE id = ?1", params![id])
                .map_err(db_err("Failed to delete product image"))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn get_images_for_products(&self, product_ids: Vec<i64>) -> Result<Vec<ProductImage>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.run(move |conn| {
            let sql = format!(
                "SELECT {IMAGE_COLUMNS} FROM product_images WHERE product_id IN ({}) \
                 ORDER BY product_id, ordering, id",
                placeholders(product_ids.len())
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(db_err("Failed to prepare image query"))?;
            let rows = stmt
                .query_map(params_from_iter(product_ids.iter()), row_to_image)
                .map_err(db_err("Failed to query product images"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Failed to read product image"))
        })
        .await
    }

    async fn create_cart(&self, expires_at: DateTime<Utc>) -> Result<Cart> {
        self.run(move |conn| {
            let now = Utc::now();
            let token = Uuid::new_v4();
            conn.execute(
                "INSERT INTO carts (token, created_at, updated_at, expires_at) VALUES (?1, ?2, ?2, ?3)",
                params![token.to_string(), ts(now), ts(expires_at)],
            )
            .map_err(db_err("Failed to insert cart"))?;
            let id = conn.last_insert_rowid();
            debug!("Created cart {} with token {}", id, token);
            Ok(Cart {
                id,
                token,
                created_at: now,
                updated_at: now,
                expires_at: Some(expires_at),
            })
        })
        .await
    }

    async fn get_cart_by_token(&self, token: Uuid) -> Result<Option<Cart>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {CART_COLUMNS} FROM carts WHERE token = ?1"),
                params![token.to_string()],
                row_to_cart,
            )
            .optional()
            .map_err(db_err("Failed to query cart"))
        })
        .await
    }

    async fn touch_cart(&self, cart_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "UPDATE carts SET expires_at = ?2, updated_at = ?3 WHERE id = ?1",
                params![cart_id, ts(expires_at), ts(Utc::now())],
            )
            .map_err(db_err("Failed to touch cart"))?;
            Ok(())
        })
        .await
    }

    async fn list_cart_items(&self, cart_id: i64) -> Result<Vec<CartItem>> {
        self.run(move |conn| Self::cart_items(conn, cart_id)).await
    }

    async fn add_cart_item(
        &self,
        cart_id: i64,
        product_id: i64,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<CartItem> {
        self.run(move |conn| {
            let tx = conn
                .transaction()
                .map_err(db_err("Failed to begin transaction"))?;
            let now = Utc::now();
            let item = match Self::cart_item(&tx, cart_id, product_id)? {
                Some(mut item) => {
                    item.quantity = merged_quantity(item.quantity, quantity)?;
                    item.recalc();
                    item.updated_at = now;
                    tx.execute(
                        "UPDATE cart_items SET quantity = ?2, line_total = ?3, updated_at = ?4 WHERE id = ?1",
                        params![item.id, item.quantity as i64, item.line_total.to_string(), ts(now)],
                    )
                    .map_err(db_err("Failed to update cart item"))?;
                    item
                }
                None => {
                    let quantity = merged_quantity(0, quantity)?;
                    let line_total = line_total(unit_price, quantity);
                    tx.execute(
                        "INSERT INTO cart_items (cart_id, product_id, quantity, unit_price_snapshot, \
                         line_total, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                        params![
                            cart_id,
                            product_id,
                            quantity as i64,
                            unit_price.to_string(),
                            line_total.to_string(),
                            ts(now)
                        ],
                    )
                    .map_err(db_err("Failed to insert cart item"))?;
                    CartItem {
                        id: tx.last_insert_rowid(),
                        cart_id,
                        product_id,
                        quantity,
                        unit_price_snapshot: unit_price,
                        line_total,
                        created_at: now,
                        updated_at: now,
                    }
                }
            };
            tx.commit().map_err(db_err("Failed to commit cart item"))?;
            Ok(item)
        })
        .await
    }

    async fn set_cart_item_quantity(
        &self,
        cart_id: i64,
        product_id: i64,
        quantity: u32,
    ) -> Result<Option<CartItem>> {
        let quantity = merged_quantity(0, quantity)?;
        self.run(move |conn| {
            let Some(mut item) = Self::cart_item(conn, cart_id, product_id)? else {
                return Ok(None);
            };
            item.quantity = quantity;
            item.recalc();
            item.updated_at = Utc::now();
            conn.execute(
                "UPDATE cart_items SET quantity = ?2, line_total = ?3, updated_at = ?4 WHERE id = ?1",
                params![item.id, quantity as i64, item.line_total.to_string(), ts(item.updated_at)],
            )
            .map_err(db_err("Failed to update cart item"))?;
            Ok(Some(item))
        })
        .await
    }

    async fn remove_cart_item(&self, cart_id: i64, product_id: i64) -> Result<bool> {
        self.run(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM cart_items WHERE cart_id = ?1 AND product_id = ?2",
                    params![cart_id, product_id],
                )
                .map_err(db_err("Failed to delete cart item"))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn clear_cart(&self, cart_id: i64) -> Result<u64> {
        self.run(move |conn| {
            let deleted = conn
                .execute("DELETE FROM cart_items WHERE cart_id = ?1", params![cart_id])
                .map_err(db_err("Failed to clear cart"))?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn purge_expired_carts(&self, now: DateTime<Utc>) -> Result<u64> {
        self.run(move |conn| {
            let deleted = conn
                .execute(
                    "DELETE FROM carts WHERE expires_at IS NOT NULL AND expires_at < ?1",
                    params![ts(now)],
                )
                .map_err(db_err("Failed to purge expired carts"))?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn create_order_from_cart(
        &self,
        cart_id: i64,
        draft: &OrderDraft,
        order_id: &str,
    ) -> Result<(Order, Vec<OrderItem>)> {
        let draft = draft.clone();
        let order_id = order_id.to_string();
        self.run(move |conn| {
            let tx = conn
                .transaction()
                .map_err(db_err("Failed to begin transaction"))?;

            let lines = Self::cart_items(&tx, cart_id)?;
            if lines.is_empty() {
                return Err(ShopError::EmptyCart);
            }
            let (_, subtotal) = cart_totals(&lines);
            let now = Utc::now();
            let mut order = draft.into_order(0, order_id.clone(), subtotal, now);

            tx.execute(
                "INSERT INTO orders (order_id, customer_name, customer_email, customer_phone, \
                 shipping_address, shipping_city, shipping_zip, delivery_notes, preferred_delivery_time, \
                 status, subtotal, discount_total, shipping_fee, grand_total, placed_ip, placed_user_agent, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?17)",
                params![
                    order.order_id,
                    order.customer_name,
                    order.customer_email,
                    order.customer_phone,
                    order.shipping_address,
                    order.shipping_city,
                    order.shipping_zip,
                    order.delivery_notes,
                    order.preferred_delivery_time,
                    order.status.as_str(),
                    order.subtotal.to_string(),
                    order.discount_total.to_string(),
                    order.shipping_fee.to_string(),
                    order.grand_total.to_string(),
                    order.placed_ip,
                    order.placed_user_agent,
                    ts(now),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ShopError::Conflict(format!("Order id {order_id} already exists"))
                } else {
                    ShopError::database(format!("Failed to insert order: {e}"))
                }
            })?;
            order.id = tx.last_insert_rowid();

            let mut items = Vec::with_capacity(lines.len());
            for line in &lines {
                let name_snapshot: String = tx
                    .query_row(
                        "SELECT name FROM products WHERE id = ?1",
                        params![line.product_id],
                        |row| row.get(0),
                    )
                    .map_err(db_err("Failed to read product name"))?;
                tx.execute(
                    "INSERT INTO order_items (order_id, product_id, name_snapshot, unit_price_snapshot, \
                     quantity, line_total, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        order.id,
                        line.product_id,
                        name_snapshot,
                        line.unit_price_snapshot.to_string(),
                        line.quantity as i64,
                        line.line_total.to_string(),
                        ts(now),
                    ],
                )
                .map_err(db_err("Failed to insert order item"))?;
                items.push(OrderItem {
                    id: tx.last_insert_rowid(),
                    order_id: order.id,
                    product_id: line.product_id,
                    name_snapshot,
                    unit_price_snapshot: line.unit_price_snapshot,
                    quantity: line.quantity,
                    line_total: line.line_total,
                    created_at: now,
                });
            }

            tx.execute("DELETE FROM cart_items WHERE cart_id = ?1", params![cart_id])
                .map_err(db_err("Failed to clear cart"))?;
            tx.commit().map_err(db_err("Failed to commit order"))?;

            info!("Created order {} with {} lines", order.order_id, items.len());
            Ok((order, items))
        })
        .await
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC"
                ))
                .map_err(db_err("Failed to prepare order query"))?;
            let rows = stmt
                .query_map([], row_to_order)
                .map_err(db_err("Failed to query orders"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Failed to read order"))
        })
        .await
    }

    async fn get_order_by_order_id(&self, order_id: &str) -> Result<Option<Order>> {
        let order_id = order_id.to_string();
        self.run(move |conn| Self::order_by_order_id(conn, &order_id)).await
    }

    async fn list_order_items(&self, order_row_id: i64) -> Result<Vec<OrderItem>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id"
                ))
                .map_err(db_err("Failed to prepare order item query"))?;
            let rows = stmt
                .query_map(params![order_row_id], row_to_order_item)
                .map_err(db_err("Failed to query order items"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Failed to read order item"))
        })
        .await
    }

    async fn update_order_status(&self, order_id: &str, status: OrderStatus) -> Result<Option<Order>> {
        let order_id = order_id.to_string();
        self.run(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE orders SET status = ?2, updated_at = ?3 WHERE order_id = ?1",
                    params![order_id, status.as_str(), ts(Utc::now())],
                )
                .map_err(db_err("Failed to update order status"))?;
            if updated == 0 {
                return Ok(None);
            }
            Self::order_by_order_id(conn, &order_id)
        })
        .await
    }

    async fn create_contact_message(&self, message: NewContactMessage) -> Result<ContactMessage> {
        self.run(move |conn| {
            let now = ts(Utc::now());
            conn.execute(
                "INSERT INTO contact_messages (name, email, phone, message, handled, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
                params![message.name, message.email, message.phone, message.message, now],
            )
            .map_err(db_err("Failed to insert contact message"))?;
            let id = conn.last_insert_rowid();
            Self::contact_by_id(conn, id)?
                .ok_or_else(|| ShopError::database("Inserted contact message disappeared"))
        })
        .await
    }

    async fn list_contact_messages(&self, limit: usize, offset: usize) -> Result<Vec<ContactMessage>> {
        self.run(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {CONTACT_COLUMNS} FROM contact_messages \
                     ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
                ))
                .map_err(db_err("Failed to prepare contact message query"))?;
            let rows = stmt
                .query_map(params![limit as i64, offset as i64], row_to_contact)
                .map_err(db_err("Failed to query contact messages"))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err("Failed to read contact message"))
        })
        .await
    }

    async fn delete_contact_message(&self, id: i64) -> Result<bool> {
        self.run(move |conn| {
            let deleted = conn
                .execute("DELETE FROM contact_messages WHERE id = ?1", params![id])
                .map_err(db_err("Failed to delete contact message"))?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn set_contact_message_handled(&self, id: i64, handled: bool) -> Result<Option<ContactMessage>> {
        self.run(move |conn| {
            conn.execute(
                "UPDATE contact_messages SET handled = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, handled, ts(Utc::now())],
            )
            .map_err(db_err("Failed to update contact message"))?;
            Self::contact_by_id(conn, id)
        })
        .await
    }

    async fn get_site_content(&self) -> Result<SiteContent> {
        self.run(move |conn| Self::site_content(conn)).await
    }

    async fn update_site_content(&self, patch: SiteContentPatch) -> Result<SiteContent> {
        self.run(move |conn| {
            let mut content = Self::site_content(conn)?;
            patch.apply(&mut content);
            content.updated_at = Utc::now();
            conn.execute(
                "UPDATE site_content SET hero_title = ?2, hero_subtitle = ?3, hero_button_text = ?4, \
                 hero_button_url = ?5, about_title = ?6, about_subtitle = ?7, about_body = ?8, \
                 updated_at = ?9 WHERE id = ?1",
                params![
                    content.id,
                    content.hero_title,
                    content.hero_subtitle,
                    content.hero_button_text,
                    content.hero_button_url,
                    content.about_title,
                    content.about_subtitle,
                    content.about_body,
                    ts(content.updated_at),
                ],
            )
            .map_err(db_err("Failed to update site content"))?;
            Ok(content)
        })
        .await
    }

    async fn get_site_settings(&self) -> Result<SiteSettings> {
        self.run(move |conn| Self::site_settings(conn)).await
    }

    async fn update_site_settings(&self, patch: SiteSettingsPatch) -> Result<SiteSettings> {
        self.run(move |conn| {
            let mut settings = Self::site_settings(conn)?;
            patch.apply(&mut settings);
            settings.updated_at = Utc::now();
            conn.execute(
                "UPDATE site_settings SET merchant_order_email = ?2, updated_at = ?3 WHERE id = ?1",
                params![settings.id, settings.merchant_order_email, ts(settings.updated_at)],
            )
            .map_err(db_err("Failed to update site settings"))?;
            Ok(settings)
        })
        .await
    }

    async fn create_admin_user(&self, user: NewAdminUser) -> Result<AdminUser> {
        self.run(move |conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO admin_users (username, email, password_hash, first_name, last_name, \
                 is_staff, is_superuser, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.username,
                    user.email,
                    user.password_hash,
                    user.first_name,
                    user.last_name,
                    user.is_staff,
                    user.is_superuser,
                    ts(now),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    ShopError::Conflict(format!("User '{}' already exists", user.username))
                } else {
                    ShopError::database(format!("Failed to insert user: {e}"))
                }
            })?;
            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {ADMIN_USER_COLUMNS} FROM admin_users WHERE id = ?1"),
                params![id],
                row_to_admin_user,
            )
            .map_err(db_err("Failed to reload user"))
        })
        .await
    }

    async fn get_admin_user_by_email(&self, email: &str) -> Result<Option<AdminUser>> {
        let email = email.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {ADMIN_USER_COLUMNS} FROM admin_users WHERE email = ?1 COLLATE NOCASE"),
                params![email],
                row_to_admin_user,
            )
            .optional()
            .map_err(db_err("Failed to query user"))
        })
        .await
    }
}
