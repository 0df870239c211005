//! Checkout: order id generation, draft validation and placing an order from the
//! caller's cart.

use crate::cart::CartSession;
use crate::common::constants::*;
use crate::common::error::{Result, ShopError};
use crate::domain::{Order, OrderDraft, OrderItem};
use crate::mailer::OrderNotifier;
use crate::metrics;
use crate::storage::Storage;
use chrono::{DateTime, Duration, Utc};
use email_address::EmailAddress;
use rand::seq::SliceRandom;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Public order id: `FC` + date + `/` + three letters and a digit in random order.
pub fn generate_order_id<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let mut suffix: Vec<char> = (0..ORDER_ID_SUFFIX_LEN - 1)
        .map(|_| rng.gen_range(b'A'..=b'Z') as char)
        .collect();
    suffix.push(rng.gen_range(b'0'..=b'9') as char);
    suffix.shuffle(rng);
    format!(
        "{}{}/{}",
        ORDER_ID_PREFIX,
        now.format("%Y%m%d"),
        suffix.into_iter().collect::<String>()
    )
}

fn required(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ShopError::Validation(format!("{field} is required")));
    }
    limited(field, value, max)
}

fn limited(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.chars().count() > max {
        return Err(ShopError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

impl OrderDraft {
    /// Trimmed copy of the draft, or the first field that fails validation.
    pub fn validate(self) -> Result<Self> {
        let customer_email = self.customer_email.trim().to_string();
        if customer_email.is_empty() {
            return Err(ShopError::Validation("customerEmail is required".to_string()));
        }
        if !EmailAddress::is_valid(&customer_email) {
            return Err(ShopError::Validation(format!(
                "'{customer_email}' is not a valid e-mail address"
            )));
        }

        Ok(Self {
            customer_name: required("customerName", &self.customer_name, MAX_CUSTOMER_NAME)?,
            customer_email,
            customer_phone: required("customerPhone", &self.customer_phone, MAX_CUSTOMER_PHONE)?,
            shipping_address: required(
                "shippingAddress",
                &self.shipping_address,
                MAX_SHIPPING_ADDRESS,
            )?,
            shipping_city: required("shippingCity", &self.shipping_city, MAX_SHIPPING_CITY)?,
            shipping_zip: required("shippingZip", &self.shipping_zip, MAX_SHIPPING_ZIP)?,
            delivery_notes: limited("deliveryNotes", &self.delivery_notes, MAX_DELIVERY_NOTES)?,
            preferred_delivery_time: limited(
                "preferredDeliveryTime",
                &self.preferred_delivery_time,
                MAX_PREFERRED_DELIVERY_TIME,
            )?,
            placed_ip: self.placed_ip.filter(|ip| !ip.trim().is_empty()),
            placed_user_agent: truncate_chars(&self.placed_user_agent, MAX_USER_AGENT),
        })
    }
}

/// Totals the storefront computed; checked against the server's but never trusted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientTotals {
    pub subtotal: Option<Decimal>,
    pub grand_total: Option<Decimal>,
}

impl ClientTotals {
    fn check(&self, order: &Order) {
        let mismatched = self.subtotal.map_or(false, |s| s != order.subtotal)
            || self.grand_total.map_or(false, |g| g != order.grand_total);
        if mismatched {
            warn!(
                order_id = %order.order_id,
                client_subtotal = ?self.subtotal,
                client_grand_total = ?self.grand_total,
                server_subtotal = %order.subtotal,
                server_grand_total = %order.grand_total,
                "Client totals differ from the cart; keeping server totals"
            );
        }
    }
}

/// Turn the caller's cart into an order.
///
/// The cart is snapshotted and emptied in one storage transaction. A colliding
/// order id is retried with a fresh one; e-mails are queued only after commit.
pub async fn place_order(
    storage: &dyn Storage,
    session: &CartSession,
    cart_ttl: Duration,
    draft: OrderDraft,
    client_totals: ClientTotals,
    notifier: Option<&OrderNotifier>,
) -> Result<(Order, Vec<OrderItem>)> {
    let draft = draft.validate()?;
    let cart = session.resolve(storage, cart_ttl).await?;

    let mut attempt = 0;
    let (order, items) = loop {
        attempt += 1;
        let order_id = generate_order_id(Utc::now(), &mut rand::thread_rng());
        match storage.create_order_from_cart(cart.id, &draft, &order_id).await {
            Ok(placed) => break placed,
            Err(ShopError::Conflict(_)) if attempt < ORDER_ID_MAX_ATTEMPTS => {
                metrics::orders::id_collision();
                warn!("Order id {} already taken, retrying", order_id);
            }
            Err(ShopError::Conflict(_)) => {
                metrics::orders::id_collision();
                return Err(ShopError::Conflict(
                    "Could not allocate a unique order id, please retry".to_string(),
                ));
            }
            Err(e) => return Err(e),
        }
    };

    client_totals.check(&order);
    session.touch(storage, cart_ttl).await?;
    metrics::orders::placed();
    info!(
        "Order {} placed: {} lines, total {}",
        order.order_id,
        items.len(),
        order.grand_total
    );

    if let Some(notifier) = notifier {
        notifier.order_placed(order.clone(), items.clone());
    }
    Ok((order, items))
}
