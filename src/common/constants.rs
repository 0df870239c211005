/// Shop-wide constants shared by the cart, order and GraphQL layers.

// Cart cookie defaults (overridable through configuration)
pub const CART_COOKIE_NAME: &str = "fc_cart";
pub const CART_COOKIE_DAYS: i64 = 30;

// Order identifiers look like FC20251018/K7QZ
pub const ORDER_ID_PREFIX: &str = "FC";
pub const ORDER_ID_SUFFIX_LEN: usize = 4;
pub const ORDER_ID_MAX_ATTEMPTS: usize = 5;

// Column limits carried over from the relational schema
pub const MAX_CATEGORY_NAME: usize = 120;
pub const MAX_CATEGORY_SLUG: usize = 140;
pub const MAX_PRODUCT_NAME: usize = 200;
pub const MAX_PRODUCT_SLUG: usize = 220;
pub const MAX_IMAGE_ALT: usize = 160;
pub const MAX_CUSTOMER_NAME: usize = 160;
pub const MAX_CUSTOMER_PHONE: usize = 50;
pub const MAX_SHIPPING_ADDRESS: usize = 300;
pub const MAX_SHIPPING_CITY: usize = 120;
pub const MAX_SHIPPING_ZIP: usize = 20;
pub const MAX_DELIVERY_NOTES: usize = 300;
pub const MAX_PREFERRED_DELIVERY_TIME: usize = 120;
pub const MAX_USER_AGENT: usize = 300;
pub const MAX_CONTACT_NAME: usize = 160;

// A cart line never holds more than GraphQL's Int can express
pub const MAX_CART_LINE_QUANTITY: u32 = i32::MAX as u32;

// Contact inbox paging defaults
pub const CONTACT_PAGE_SIZE: i32 = 20;

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_multibyte_characters() {
        assert_eq!(truncate_chars("őrölt kávé", 5), "őrölt");
        assert_eq!(truncate_chars("short", 300), "short");
    }
}
