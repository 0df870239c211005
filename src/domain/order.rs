use crate::common::error::{Result, ShopError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Delivered,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "placed" => Ok(OrderStatus::Placed),
            "delivered" => Ok(OrderStatus::Delivered),
            "canceled" => Ok(OrderStatus::Canceled),
            other => Err(ShopError::Validation(format!(
                "Unknown order status '{other}' (expected placed, delivered or canceled)"
            ))),
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Placed
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: String,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_zip: String,
    pub delivery_notes: String,
    pub preferred_delivery_time: String,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub shipping_fee: Decimal,
    pub grand_total: Decimal,
    pub placed_ip: Option<String>,
    pub placed_user_agent: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub name_snapshot: String,
    pub unit_price_snapshot: Decimal,
    pub quantity: u32,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Customer and delivery data collected at checkout, before totals exist.
#[derive(Debug, Clone, Default)]
pub struct OrderDraft {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_zip: String,
    pub delivery_notes: String,
    pub preferred_delivery_time: String,
    pub placed_ip: Option<String>,
    pub placed_user_agent: String,
}

impl OrderDraft {
    /// Build the order row for a cart whose lines sum to `subtotal`.
    pub fn into_order(
        self,
        id: i64,
        order_id: String,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Order {
        let discount_total = Decimal::ZERO;
        let shipping_fee = Decimal::ZERO;
        Order {
            id,
            order_id,
            customer_name: self.customer_name,
            customer_email: Some(self.customer_email),
            customer_phone: self.customer_phone,
            shipping_address: self.shipping_address,
            shipping_city: self.shipping_city,
            shipping_zip: self.shipping_zip,
            delivery_notes: self.delivery_notes,
            preferred_delivery_time: self.preferred_delivery_time,
            status: OrderStatus::Placed,
            subtotal,
            discount_total,
            shipping_fee,
            grand_total: subtotal + shipping_fee - discount_total,
            placed_ip: self.placed_ip,
            placed_user_agent: self.placed_user_agent,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(OrderStatus::parse("Delivered").unwrap(), OrderStatus::Delivered);
        assert_eq!(OrderStatus::parse(" canceled ").unwrap(), OrderStatus::Canceled);
        assert!(matches!(
            OrderStatus::parse("shipped"),
            Err(ShopError::Validation(_))
        ));
    }

    #[test]
    fn grand_total_equals_subtotal_without_fees() {
        let order = OrderDraft::default().into_order(
            1,
            "FC20250101/ABC1".to_string(),
            Decimal::new(250000, 2),
            Utc::now(),
        );
        assert_eq!(order.grand_total, order.subtotal);
        assert_eq!(order.status, OrderStatus::Placed);
    }
}
