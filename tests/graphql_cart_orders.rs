mod common;

use chrono::{Duration, Utc};
use common::{decimal, error_code, TestShop};
use family_coffee::domain::NewProduct;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

const ADD_TO_CART: &str = r#"
    mutation($productId: ID!, $quantity: Int!) {
        addToCart(productId: $productId, quantity: $quantity) {
            success
            cart { token totalItems totalPrice items { quantity unitPriceSnapshot lineTotal product { slug } } }
        }
    }
"#;

const CREATE_ORDER: &str = r#"
    mutation($input: OrderInput!) {
        createOrder(input: $input) {
            success
            order { orderId status subtotal grandTotal customerEmail items { nameSnapshot quantity lineTotal } }
        }
    }
"#;

fn order_input() -> serde_json::Value {
    json!({
        "customerName": "Kovács Éva",
        "customerEmail": "eva@example.com",
        "customerPhone": "+36 30 123 4567",
        "shippingAddress": "Kossuth tér 2.",
        "shippingCity": "Szeged",
        "shippingZip": "6720",
        "deliveryNotes": "Csengessen kétszer",
        "subtotal": "9980",
        "grandTotal": "9980"
    })
}

async fn product(shop: &TestShop, slug: &str, price: i64, active: bool) -> String {
    let product = shop
        .storage
        .create_product(NewProduct {
            is_active: active,
            ..NewProduct::new(slug, slug, Decimal::new(price, 0))
        })
        .await
        .unwrap();
    product.id.to_string()
}

/// Token of the cart the first request created.
async fn cart_with(shop: &TestShop, product_id: &str, quantity: i32) -> Uuid {
    let (_, session) = shop
        .run_as(None, ADD_TO_CART, json!({ "productId": product_id, "quantity": quantity }))
        .await;
    session.issued_token().await.unwrap()
}

#[tokio::test]
async fn cart_query_creates_and_issues_a_cart() {
    let shop = TestShop::new();
    let (response, session) = shop.run_as(None, "{ cart { token totalItems } }", json!({})).await;
    let token = response["data"]["cart"]["token"].as_str().unwrap();
    assert_eq!(response["data"]["cart"]["totalItems"], 0);
    assert_eq!(session.issued_token().await.map(|t| t.to_string()).as_deref(), Some(token));

    let (again, session) = shop
        .run_as(Some(token.parse().unwrap()), "{ cart { token } }", json!({}))
        .await;
    assert_eq!(again["data"]["cart"]["token"], token);
    assert!(session.issued_token().await.is_none());
}

#[tokio::test]
async fn adding_merges_lines_and_keeps_price_snapshot() {
    let shop = TestShop::new();
    let id = product(&shop, "crema", 4990, true).await;
    let token = cart_with(&shop, &id, 1).await;

    shop.storage
        .update_product(
            id.parse().unwrap(),
            family_coffee::domain::ProductPatch {
                price: Some(Decimal::new(5990, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (response, session) = shop
        .run_as(Some(token), ADD_TO_CART, json!({ "productId": id, "quantity": 2 }))
        .await;
    let cart = &response["data"]["addToCart"]["cart"];
    assert_eq!(cart["totalItems"], 3);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(decimal(&cart["items"][0]["unitPriceSnapshot"]), Decimal::new(4990, 0));
    assert_eq!(decimal(&cart["totalPrice"]), Decimal::new(14970, 0));
    // mutations slide the expiry and re-issue the cookie
    assert_eq!(session.issued_token().await, Some(token));
}

#[tokio::test]
async fn add_rejects_bad_quantity_and_inactive_products() {
    let shop = TestShop::new();
    let active = product(&shop, "crema", 4990, true).await;
    let hidden = product(&shop, "decaf", 3990, false).await;

    let zero = shop.run(ADD_TO_CART, json!({ "productId": active, "quantity": 0 })).await;
    assert_eq!(error_code(&zero), Some("BAD_USER_INPUT"));

    let inactive = shop.run(ADD_TO_CART, json!({ "productId": hidden, "quantity": 1 })).await;
    assert_eq!(error_code(&inactive), Some("NOT_FOUND"));
    assert_eq!(inactive["errors"][0]["message"], "Product not found");
}

#[tokio::test]
async fn line_quantity_is_capped_at_int_range() {
    let shop = TestShop::new();
    let crema = product(&shop, "crema", 1, true).await;
    let oro = product(&shop, "oro", 1, true).await;
    let token = cart_with(&shop, &crema, i32::MAX).await;

    let (overflow, _) = shop
        .run_as(Some(token), ADD_TO_CART, json!({ "productId": crema, "quantity": i32::MAX }))
        .await;
    assert_eq!(error_code(&overflow), Some("BAD_USER_INPUT"));
    let (again, _) = shop
        .run_as(Some(token), ADD_TO_CART, json!({ "productId": crema, "quantity": 1 }))
        .await;
    assert_eq!(error_code(&again), Some("BAD_USER_INPUT"));

    let (cart, _) = shop
        .run_as(Some(token), "{ cart { totalItems items { quantity } } }", json!({}))
        .await;
    assert_eq!(cart["data"]["cart"]["totalItems"], i32::MAX);
    assert_eq!(cart["data"]["cart"]["items"][0]["quantity"], i32::MAX);

    // two full lines still report a valid Int
    let (both, _) = shop
        .run_as(Some(token), ADD_TO_CART, json!({ "productId": oro, "quantity": i32::MAX }))
        .await;
    assert_eq!(both["data"]["addToCart"]["cart"]["totalItems"], i32::MAX);
    assert_eq!(
        decimal(&both["data"]["addToCart"]["cart"]["totalPrice"]),
        Decimal::from(i32::MAX) * Decimal::TWO
    );
}

#[tokio::test]
async fn update_and_remove_cart_lines() {
    let shop = TestShop::new();
    let crema = product(&shop, "crema", 4990, true).await;
    let oro = product(&shop, "oro", 5490, true).await;
    let token = cart_with(&shop, &crema, 1).await;
    shop.run_as(Some(token), ADD_TO_CART, json!({ "productId": oro, "quantity": 1 }))
        .await;

    let update = r#"
        mutation($productId: ID!, $quantity: Int!) {
            updateCartItem(productId: $productId, quantity: $quantity) { cart { totalItems } }
        }
    "#;
    let (updated, _) = shop
        .run_as(Some(token), update, json!({ "productId": crema, "quantity": 4 }))
        .await;
    assert_eq!(updated["data"]["updateCartItem"]["cart"]["totalItems"], 5);

    let (zeroed, _) = shop
        .run_as(Some(token), update, json!({ "productId": crema, "quantity": 0 }))
        .await;
    assert_eq!(zeroed["data"]["updateCartItem"]["cart"]["totalItems"], 1);

    let remove = r#"
        mutation($productId: ID!) { removeFromCart(productId: $productId) { cart { totalItems } } }
    "#;
    let (missing, _) = shop
        .run_as(Some(token), remove, json!({ "productId": crema }))
        .await;
    assert_eq!(error_code(&missing), Some("NOT_FOUND"));

    let (cleared, _) = shop
        .run_as(Some(token), "mutation { clearCart { cart { totalItems } } }", json!({}))
        .await;
    assert_eq!(cleared["data"]["clearCart"]["cart"]["totalItems"], 0);
}

#[tokio::test]
async fn expired_cart_is_replaced() {
    let shop = TestShop::new();
    let old = shop
        .storage
        .create_cart(Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let (response, session) = shop.run_as(Some(old.token), "{ cart { token } }", json!({})).await;
    let token = response["data"]["cart"]["token"].as_str().unwrap();
    assert_ne!(token, old.token.to_string());
    assert!(session.issued_token().await.is_some());
}

#[tokio::test]
async fn checkout_snapshots_cart_into_order() {
    let shop = TestShop::new();
    let id = product(&shop, "crema", 4990, true).await;
    let token = cart_with(&shop, &id, 2).await;

    let (response, _) = shop
        .run_as(Some(token), CREATE_ORDER, json!({ "input": order_input() }))
        .await;
    let order = &response["data"]["createOrder"]["order"];
    let order_id = order["orderId"].as_str().unwrap();
    assert!(order_id.starts_with(&format!("FC{}/", Utc::now().format("%Y%m%d"))));
    assert_eq!(order["status"], "placed");
    assert_eq!(decimal(&order["subtotal"]), Decimal::new(9980, 0));
    assert_eq!(decimal(&order["grandTotal"]), Decimal::new(9980, 0));
    assert_eq!(order["items"][0]["nameSnapshot"], "crema");
    assert_eq!(order["items"][0]["quantity"], 2);

    let (cart, _) = shop.run_as(Some(token), "{ cart { totalItems } }", json!({})).await;
    assert_eq!(cart["data"]["cart"]["totalItems"], 0);

    let stored = shop.storage.get_order_by_order_id(order_id).await.unwrap().unwrap();
    assert_eq!(stored.placed_ip.as_deref(), Some("203.0.113.9"));
    assert_eq!(stored.placed_user_agent, "integration-test");
}

#[tokio::test]
async fn checkout_requires_items_and_valid_contact() {
    let shop = TestShop::new();
    let empty = shop.run(CREATE_ORDER, json!({ "input": order_input() })).await;
    assert_eq!(error_code(&empty), Some("EMPTY_CART"));

    let id = product(&shop, "crema", 4990, true).await;
    let token = cart_with(&shop, &id, 1).await;
    let mut input = order_input();
    input["customerEmail"] = json!("not-an-address");
    let (invalid, _) = shop.run_as(Some(token), CREATE_ORDER, json!({ "input": input })).await;
    assert_eq!(error_code(&invalid), Some("BAD_USER_INPUT"));

    let (cart, _) = shop.run_as(Some(token), "{ cart { totalItems } }", json!({})).await;
    assert_eq!(cart["data"]["cart"]["totalItems"], 1);
}

#[tokio::test]
async fn order_status_can_be_changed_and_looked_up() {
    let shop = TestShop::new();
    let id = product(&shop, "crema", 4990, true).await;
    let token = cart_with(&shop, &id, 1).await;
    let (placed, _) = shop
        .run_as(Some(token), CREATE_ORDER, json!({ "input": order_input() }))
        .await;
    let order_id = placed["data"]["createOrder"]["order"]["orderId"].clone();

    let update = r#"
        mutation($orderId: String!, $status: String!) {
            updateOrderStatus(orderId: $orderId, status: $status) { order { status } }
        }
    "#;
    let delivered = shop
        .run(update, json!({ "orderId": order_id, "status": "delivered" }))
        .await;
    assert_eq!(delivered["data"]["updateOrderStatus"]["order"]["status"], "delivered");

    let bogus = shop
        .run(update, json!({ "orderId": order_id, "status": "shipped" }))
        .await;
    assert_eq!(error_code(&bogus), Some("BAD_USER_INPUT"));

    let unknown = shop
        .run(update, json!({ "orderId": "FC20000101/AAA1", "status": "canceled" }))
        .await;
    assert_eq!(error_code(&unknown), Some("NOT_FOUND"));

    let lookup = shop
        .run(
            r#"query($id: String!) { order(orderId: $id) { status items { quantity } } }"#,
            json!({ "id": order_id }),
        )
        .await;
    assert_eq!(lookup["data"]["order"]["status"], "delivered");
    assert_eq!(lookup["data"]["order"]["items"][0]["quantity"], 1);
}
