use chrono::{Duration, Utc};
use family_coffee::domain::{
    NewCategory, NewContactMessage, NewProduct, NewProductImage, OrderDraft, OrderStatus,
    ProductFilter, ProductPatch, SiteContentPatch,
};
use family_coffee::storage::{SqliteStorage, Storage};
use family_coffee::ShopError;
use rust_decimal::Decimal;
use std::sync::Arc;
use tempfile::tempdir;

fn draft() -> OrderDraft {
    OrderDraft {
        customer_name: "Szabó Anna".to_string(),
        customer_email: "anna@example.com".to_string(),
        customer_phone: "+36 20 555 1234".to_string(),
        shipping_address: "Fő utca 1.".to_string(),
        shipping_city: "Budapest".to_string(),
        shipping_zip: "1011".to_string(),
        ..OrderDraft::default()
    }
}

async fn product(storage: &SqliteStorage, slug: &str, price: Decimal) -> i64 {
    storage
        .create_product(NewProduct::new(slug, slug, price))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn file_database_persists_across_connections() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("shop.db");

    {
        let storage = SqliteStorage::connect(&path).unwrap();
        storage
            .create_category(NewCategory {
                name: "Kávé".to_string(),
                slug: "kave".to_string(),
            })
            .await
            .unwrap();
    }

    let reopened = SqliteStorage::connect(&path).unwrap();
    let category = reopened.get_category_by_slug("kave").await.unwrap().unwrap();
    assert_eq!(category.name, "Kávé");
}

#[tokio::test]
async fn decimals_round_trip_exactly() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let id = product(&storage, "crema", Decimal::new(499050, 2)).await;
    let stored = storage.get_product(id).await.unwrap().unwrap();
    assert_eq!(stored.price, Decimal::new(499050, 2));
    assert_eq!(stored.vat, Decimal::new(2700, 2));
}

#[tokio::test]
async fn unique_slugs_raise_conflict() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    product(&storage, "crema", Decimal::ONE).await;
    let err = storage
        .create_product(NewProduct::new("Other", "crema", Decimal::ONE))
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Conflict(_)));
}

#[tokio::test]
async fn category_delete_detaches_products_and_product_delete_drops_images() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let category = storage
        .create_category(NewCategory {
            name: "Tea".to_string(),
            slug: "tea".to_string(),
        })
        .await
        .unwrap();
    let product = storage
        .create_product(NewProduct {
            category_id: Some(category.id),
            ..NewProduct::new("Earl Grey", "earl-grey", Decimal::new(1990, 0))
        })
        .await
        .unwrap();
    for (image, ordering) in [("b.jpg", 2), ("a.jpg", 1)] {
        storage
            .add_product_image(NewProductImage {
                product_id: product.id,
                image: image.to_string(),
                alt: String::new(),
                ordering,
            })
            .await
            .unwrap();
    }
    let images = storage.get_images_for_products(vec![product.id]).await.unwrap();
    assert_eq!(images[0].image, "a.jpg");

    assert!(storage.delete_category(category.id).await.unwrap());
    let detached = storage.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(detached.category_id, None);

    assert!(storage.delete_product(product.id).await.unwrap());
    assert!(storage
        .get_images_for_products(vec![product.id])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn listing_applies_filters() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    product(&storage, "espresso", Decimal::ONE).await;
    let decaf = product(&storage, "decaf", Decimal::ONE).await;
    storage
        .update_product(
            decaf,
            ProductPatch {
                is_active: Some(false),
                description: Some("Koffeinmentes".to_string()),
                ..ProductPatch::default()
            },
        )
        .await
        .unwrap();

    let active = storage.list_products(&ProductFilter::default()).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].slug, "espresso");

    let inactive = storage
        .list_products(&ProductFilter {
            search: Some("koffein".to_string()),
            is_active: false,
            ..ProductFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].slug, "decaf");
}

#[tokio::test]
async fn cart_lines_merge_and_orders_empty_the_cart() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let id = product(&storage, "crema", Decimal::new(4990, 0)).await;
    let cart = storage
        .create_cart(Utc::now() + Duration::days(30))
        .await
        .unwrap();

    storage.add_cart_item(cart.id, id, 1, Decimal::new(4990, 0)).await.unwrap();
    let merged = storage
        .add_cart_item(cart.id, id, 2, Decimal::new(5990, 0))
        .await
        .unwrap();
    assert_eq!(merged.quantity, 3);
    assert_eq!(merged.unit_price_snapshot, Decimal::new(4990, 0));
    assert_eq!(merged.line_total, Decimal::new(14970, 0));

    let (order, items) = storage
        .create_order_from_cart(cart.id, &draft(), "FC20250101/AB1C")
        .await
        .unwrap();
    assert_eq!(order.subtotal, Decimal::new(14970, 0));
    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(items.len(), 1);
    assert!(storage.list_cart_items(cart.id).await.unwrap().is_empty());

    let again = storage
        .create_order_from_cart(cart.id, &draft(), "FC20250101/AB2C")
        .await
        .unwrap_err();
    assert!(matches!(again, ShopError::EmptyCart));
}

#[tokio::test]
async fn overflowing_cart_line_is_rejected_and_left_intact() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let id = product(&storage, "crema", Decimal::ONE).await;
    let cart = storage.create_cart(Utc::now() + Duration::days(1)).await.unwrap();
    let max = i32::MAX as u32;

    storage.add_cart_item(cart.id, id, max, Decimal::ONE).await.unwrap();
    for _ in 0..2 {
        let err = storage
            .add_cart_item(cart.id, id, max, Decimal::ONE)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
    }
    let lines = storage.list_cart_items(cart.id).await.unwrap();
    assert_eq!(lines[0].quantity, max);

    let err = storage
        .set_cart_item_quantity(cart.id, id, u32::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Validation(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_writers_share_one_connection() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let id = product(&storage, "crema", Decimal::ONE).await;
    let cart = storage.create_cart(Utc::now() + Duration::days(1)).await.unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let storage = storage.clone();
            tokio::spawn(async move {
                storage.add_cart_item(cart.id, id, 1, Decimal::ONE).await.unwrap();
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let lines = storage.list_cart_items(cart.id).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 16);
}

#[tokio::test]
async fn duplicate_order_id_conflicts_and_keeps_cart() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let id = product(&storage, "crema", Decimal::new(4990, 0)).await;
    let first = storage.create_cart(Utc::now() + Duration::days(1)).await.unwrap();
    let second = storage.create_cart(Utc::now() + Duration::days(1)).await.unwrap();
    for cart in [&first, &second] {
        storage.add_cart_item(cart.id, id, 1, Decimal::new(4990, 0)).await.unwrap();
    }

    storage
        .create_order_from_cart(first.id, &draft(), "FC20250101/ZZ9Z")
        .await
        .unwrap();
    let err = storage
        .create_order_from_cart(second.id, &draft(), "FC20250101/ZZ9Z")
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Conflict(_)));
    assert_eq!(storage.list_cart_items(second.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn expired_carts_are_purged() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let stale = storage.create_cart(Utc::now() - Duration::hours(1)).await.unwrap();
    let live = storage.create_cart(Utc::now() + Duration::hours(1)).await.unwrap();

    assert_eq!(storage.purge_expired_carts(Utc::now()).await.unwrap(), 1);
    assert!(storage.get_cart_by_token(stale.token).await.unwrap().is_none());
    assert!(storage.get_cart_by_token(live.token).await.unwrap().is_some());
}

#[tokio::test]
async fn singletons_and_inbox() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let content = storage
        .update_site_content(SiteContentPatch {
            about_title: Some("Rólunk".to_string()),
            ..SiteContentPatch::default()
        })
        .await
        .unwrap();
    assert_eq!(content.about_title, "Rólunk");
    assert_eq!(storage.get_site_content().await.unwrap().about_title, "Rólunk");

    let message = storage
        .create_contact_message(NewContactMessage {
            name: "Péter".to_string(),
            email: None,
            phone: Some("+36 70 000 0000".to_string()),
            message: "Szia!".to_string(),
        })
        .await
        .unwrap();
    assert!(!message.handled);
    let handled = storage
        .set_contact_message_handled(message.id, true)
        .await
        .unwrap()
        .unwrap();
    assert!(handled.handled);
    assert_eq!(storage.list_contact_messages(10, 0).await.unwrap().len(), 1);
    assert!(storage.delete_contact_message(message.id).await.unwrap());
    assert!(!storage.delete_contact_message(message.id).await.unwrap());
}
