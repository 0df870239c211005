use crate::common::constants::MAX_CART_LINE_QUANTITY;
use crate::common::error::{Result, ShopError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: i64,
    pub token: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cart {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at < now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub cart_id: i64,
    pub product_id: i64,
    pub quantity: u32,
    /// Product price at the moment the line was first added.
    pub unit_price_snapshot: Decimal,
    pub line_total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn recalc(&mut self) {
        self.line_total = line_total(self.unit_price_snapshot, self.quantity);
    }
}

pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Quantity of a line after adding `added` to `current`.
pub fn merged_quantity(current: u32, added: u32) -> Result<u32> {
    current
        .checked_add(added)
        .filter(|q| *q <= MAX_CART_LINE_QUANTITY)
        .ok_or_else(|| {
            ShopError::Validation(format!(
                "A cart line can hold at most {MAX_CART_LINE_QUANTITY} items"
            ))
        })
}

/// Total quantity and subtotal of a set of cart lines; the quantity saturates.
pub fn cart_totals(items: &[CartItem]) -> (u32, Decimal) {
    items.iter().fold((0u32, Decimal::ZERO), |(qty, sum), item| {
        (qty.saturating_add(item.quantity), sum + item.line_total)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32, price: i64) -> CartItem {
        let now = Utc::now();
        let mut item = CartItem {
            id: 1,
            cart_id: 1,
            product_id: 1,
            quantity,
            unit_price_snapshot: Decimal::new(price * 100, 2),
            line_total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        item.recalc();
        item
    }

    #[test]
    fn totals_of_empty_cart_are_zero() {
        assert_eq!(cart_totals(&[]), (0, Decimal::ZERO));
    }

    #[test]
    fn totals_sum_quantities_and_line_totals() {
        let items = vec![item(3, 1000), item(2, 450)];
        let (qty, subtotal) = cart_totals(&items);
        assert_eq!(qty, 5);
        assert_eq!(subtotal, Decimal::new(390000, 2));
    }

    #[test]
    fn merged_quantity_stops_at_int_range() {
        assert_eq!(merged_quantity(2, 3).unwrap(), 5);
        assert_eq!(merged_quantity(0, MAX_CART_LINE_QUANTITY).unwrap(), MAX_CART_LINE_QUANTITY);
        assert!(matches!(
            merged_quantity(MAX_CART_LINE_QUANTITY, 1),
            Err(ShopError::Validation(_))
        ));
        assert!(merged_quantity(u32::MAX, u32::MAX).is_err());
    }

    #[test]
    fn totals_saturate_instead_of_overflowing() {
        let items = vec![item(u32::MAX, 1), item(5, 1)];
        assert_eq!(cart_totals(&items).0, u32::MAX);
    }

    #[test]
    fn cart_without_expiry_never_expires() {
        let now = Utc::now();
        let cart = Cart {
            id: 1,
            token: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            expires_at: None,
        };
        assert!(!cart.is_expired(now + chrono::Duration::days(365)));
    }
}
