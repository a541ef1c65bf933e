//! Integration tests for checkout and the order lifecycle.
//!
//! These tests require a running `PostgreSQL` database and the API server
//! (cargo run -p marketplace-api).

#![allow(clippy::unwrap_used)]

use marketplace_integration_tests::{
    api, create_product, customer, expect_json, id_of, store_owner,
};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn add_to_cart(buyer: &Client, product: &Value, quantity: u32) {
    let response = buyer
        .post(api("/cart/items"))
        .json(&json!({ "product_id": id_of(product), "quantity": quantity }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn checkout(buyer: &Client) -> reqwest::Response {
    buyer
        .post(api("/cart/checkout"))
        .json(&json!({
            "payment_method": "card",
            "shipping_address": "12 Valiasr St, Tehran",
        }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_checkout_splits_orders_by_store() {
    let (seller_a, _) = store_owner("Store A").await;
    let (seller_b, _) = store_owner("Store B").await;
    let shirt = create_product(&seller_a, "100.00", 5).await;
    let hat = create_product(&seller_b, "25.50", 2).await;

    let (buyer, _) = customer().await;
    add_to_cart(&buyer, &shirt, 2).await;
    add_to_cart(&buyer, &hat, 2).await;

    let orders = expect_json(checkout(&buyer).await, StatusCode::CREATED).await;
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o["status"] == "pending"));

    let cart = expect_json(buyer.get(api("/cart")).send().await.unwrap(), StatusCode::OK).await;
    assert_eq!(cart["count"], 0);

    let hat = reqwest::get(api(&format!("/products/{}", id_of(&hat))))
        .await
        .unwrap();
    let hat = expect_json(hat, StatusCode::OK).await;
    assert_eq!(hat["stock"], 0);
    assert_eq!(hat["status"], "out_of_stock");
    assert_eq!(hat["sales_count"], 1);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_checkout_empty_cart() {
    let (buyer, _) = customer().await;
    assert_eq!(checkout(&buyer).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_checkout_insufficient_stock_changes_nothing() {
    let (seller, _) = store_owner("Short Store").await;
    let product = create_product(&seller, "9.99", 1).await;
    let (buyer, _) = customer().await;
    add_to_cart(&buyer, &product, 3).await;

    assert_eq!(checkout(&buyer).await.status(), StatusCode::CONFLICT);

    let cart = expect_json(buyer.get(api("/cart")).send().await.unwrap(), StatusCode::OK).await;
    assert_eq!(cart["count"], 1);
    let product = reqwest::get(api(&format!("/products/{}", id_of(&product))))
        .await
        .unwrap();
    assert_eq!(expect_json(product, StatusCode::OK).await["stock"], 1);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_order_status_lifecycle() {
    let (seller, seller_user) = store_owner("Lifecycle Store").await;
    let product = create_product(&seller, "50.00", 4).await;
    let (buyer, _) = customer().await;
    add_to_cart(&buyer, &product, 1).await;

    let orders = expect_json(checkout(&buyer).await, StatusCode::CREATED).await;
    let order_id = id_of(&orders[0]);
    let status_url = api(&format!("/orders/{order_id}/status"));

    // Buyer may not ship
    let response = buyer
        .patch(&status_url)
        .json(&json!({ "status": "shipped" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Pending cannot jump to delivered
    let response = seller
        .patch(&status_url)
        .json(&json!({ "status": "delivered" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = seller
        .patch(&status_url)
        .json(&json!({ "status": "paid" }))
        .send()
        .await
        .unwrap();
    assert_eq!(expect_json(response, StatusCode::OK).await["status"], "paid");

    let stats = seller
        .get(api(&format!("/store-owners/{}/statistics", id_of(&seller_user))))
        .send()
        .await
        .unwrap();
    let stats = expect_json(stats, StatusCode::OK).await;
    assert_eq!(stats["total_sales"], 1);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_orders_are_private() {
    let (seller, _) = store_owner("Private Store").await;
    let product = create_product(&seller, "5.00", 2).await;
    let (buyer, _) = customer().await;
    add_to_cart(&buyer, &product, 1).await;
    let orders = expect_json(checkout(&buyer).await, StatusCode::CREATED).await;

    let (stranger, _) = customer().await;
    let response = stranger
        .get(api(&format!("/orders/{}", id_of(&orders[0]))))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
