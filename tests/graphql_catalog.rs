mod common;

use common::{decimal, error_code, TestShop};
use rust_decimal::Decimal;
use serde_json::json;

const CREATE_CATEGORY: &str = r#"
    mutation($name: String!, $slug: String) {
        createCategory(name: $name, slug: $slug) { success category { id name slug } }
    }
"#;

const CREATE_PRODUCT: &str = r#"
    mutation($input: ProductInput!) {
        createProduct(input: $input) {
            success
            product { id name slug price vat isActive imageUrl category { slug } }
        }
    }
"#;

async fn category(shop: &TestShop, name: &str) -> String {
    let response = shop.run(CREATE_CATEGORY, json!({ "name": name })).await;
    response["data"]["createCategory"]["category"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn category_slug_is_derived_from_name() {
    let shop = TestShop::new();
    let response = shop.run(CREATE_CATEGORY, json!({ "name": "Szemes kávék" })).await;
    assert_eq!(response["data"]["createCategory"]["category"]["slug"], "szemes-kavek");

    let duplicate = shop.run(CREATE_CATEGORY, json!({ "name": "Szemes kávék" })).await;
    assert_eq!(error_code(&duplicate), Some("CONFLICT"));

    let blank = shop.run(CREATE_CATEGORY, json!({ "name": "  " })).await;
    assert_eq!(error_code(&blank), Some("BAD_USER_INPUT"));
}

#[tokio::test]
async fn products_get_unique_slugs_and_defaults() {
    let shop = TestShop::new();
    let category_id = category(&shop, "Kávé").await;

    let first = shop
        .run(
            CREATE_PRODUCT,
            json!({ "input": {
                "name": "Lavazza Crema e Gusto",
                "price": "4990.00",
                "categoryId": category_id,
                "image": "products/crema.jpg"
            }}),
        )
        .await;
    let product = &first["data"]["createProduct"]["product"];
    assert_eq!(product["slug"], "lavazza-crema-e-gusto");
    assert_eq!(decimal(&product["vat"]), Decimal::new(27, 0));
    assert_eq!(product["isActive"], true);
    assert_eq!(product["category"]["slug"], "kave");
    assert_eq!(product["imageUrl"], "http://shop.test/media/products/crema.jpg");

    let second = shop
        .run(
            CREATE_PRODUCT,
            json!({ "input": { "name": "Lavazza Crema e Gusto", "price": "5200" } }),
        )
        .await;
    assert_eq!(
        second["data"]["createProduct"]["product"]["slug"],
        "lavazza-crema-e-gusto-2"
    );
}

#[tokio::test]
async fn product_input_is_validated() {
    let shop = TestShop::new();

    let negative = shop
        .run(CREATE_PRODUCT, json!({ "input": { "name": "Bad", "price": "-1" } }))
        .await;
    assert_eq!(error_code(&negative), Some("BAD_USER_INPUT"));

    let unknown_category = shop
        .run(
            CREATE_PRODUCT,
            json!({ "input": { "name": "Orphan", "price": "10", "categoryId": "999" } }),
        )
        .await;
    assert_eq!(error_code(&unknown_category), Some("NOT_FOUND"));
}

#[tokio::test]
async fn listing_filters_by_category_search_and_activity() {
    let shop = TestShop::new();
    let coffee = category(&shop, "Kávé").await;
    let tea = category(&shop, "Tea").await;

    for (name, category, active) in [
        ("Espresso Blend", &coffee, true),
        ("Decaf Blend", &coffee, false),
        ("Earl Grey", &tea, true),
    ] {
        shop.run(
            CREATE_PRODUCT,
            json!({ "input": { "name": name, "price": "1000", "categoryId": category, "isActive": active } }),
        )
        .await;
    }

    let query = r#"
        query($category: String, $search: String, $active: Boolean) {
            products(category: $category, search: $search, isActive: $active) { name }
        }
    "#;
    let names = |response: serde_json::Value| -> Vec<String> {
        response["data"]["products"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap().to_string())
            .collect()
    };

    let all_active = shop.run(query, json!({})).await;
    assert_eq!(names(all_active), vec!["Earl Grey", "Espresso Blend"]);

    let coffee_only = shop.run(query, json!({ "category": "kave" })).await;
    assert_eq!(names(coffee_only), vec!["Espresso Blend"]);

    let inactive = shop.run(query, json!({ "active": false })).await;
    assert_eq!(names(inactive), vec!["Decaf Blend"]);

    let search = shop.run(query, json!({ "search": "GREY" })).await;
    assert_eq!(names(search), vec!["Earl Grey"]);

    let hidden = shop
        .run(r#"{ product(slug: "decaf-blend") { name } }"#, json!({}))
        .await;
    assert!(hidden["data"]["product"].is_null());
}

#[tokio::test]
async fn update_product_patches_and_clears_fields() {
    let shop = TestShop::new();
    let category_id = category(&shop, "Kávé").await;
    let created = shop
        .run(
            CREATE_PRODUCT,
            json!({ "input": { "name": "Crema", "price": "4990", "categoryId": category_id, "image": "a.jpg" } }),
        )
        .await;
    let id = created["data"]["createProduct"]["product"]["id"].clone();

    let update = r#"
        mutation($id: ID!, $input: ProductUpdateInput!) {
            updateProduct(id: $id, input: $input) {
                product { name slug price image category { id } }
            }
        }
    "#;
    let response = shop
        .run(
            update,
            json!({ "id": id, "input": { "price": "5490", "slug": "Crema Új", "image": null, "categoryId": null } }),
        )
        .await;
    let product = &response["data"]["updateProduct"]["product"];
    assert_eq!(product["name"], "Crema");
    assert_eq!(product["slug"], "crema-uj");
    assert_eq!(decimal(&product["price"]), Decimal::new(5490, 0));
    assert!(product["image"].is_null());
    assert!(product["category"].is_null());

    let missing = shop
        .run(update, json!({ "id": "4242", "input": { "name": "Nope" } }))
        .await;
    assert_eq!(error_code(&missing), Some("NOT_FOUND"));
}

#[tokio::test]
async fn gallery_images_are_ordered() {
    let shop = TestShop::new();
    let created = shop
        .run(CREATE_PRODUCT, json!({ "input": { "name": "Grinder", "price": "19990" } }))
        .await;
    let id = created["data"]["createProduct"]["product"]["id"].clone();

    let add = r#"
        mutation($id: ID!, $image: String!, $ordering: Int) {
            addProductImage(productId: $id, image: $image, ordering: $ordering) { image { id } }
        }
    "#;
    shop.run(add, json!({ "id": id, "image": "side.jpg", "ordering": 2 })).await;
    shop.run(add, json!({ "id": id, "image": "front.jpg", "ordering": 1 })).await;

    let response = shop
        .run(r#"{ product(slug: "grinder") { images { image imageUrl ordering } } }"#, json!({}))
        .await;
    let images = response["data"]["product"]["images"].as_array().unwrap();
    assert_eq!(images[0]["image"], "front.jpg");
    assert_eq!(images[1]["image"], "side.jpg");
    assert_eq!(images[0]["imageUrl"], "http://shop.test/media/front.jpg");
}

#[tokio::test]
async fn deleting_category_keeps_products() {
    let shop = TestShop::new();
    let category_id = category(&shop, "Kávé").await;
    shop.run(
        CREATE_PRODUCT,
        json!({ "input": { "name": "Crema", "price": "4990", "categoryId": category_id } }),
    )
    .await;

    let deleted = shop
        .run(
            r#"mutation($id: ID!) { deleteCategory(id: $id) { success } }"#,
            json!({ "id": category_id }),
        )
        .await;
    assert_eq!(deleted["data"]["deleteCategory"]["success"], true);

    let product = shop
        .run(r#"{ product(slug: "crema") { name category { id } } }"#, json!({}))
        .await;
    assert_eq!(product["data"]["product"]["name"], "Crema");
    assert!(product["data"]["product"]["category"].is_null());
}
