//! Integration tests for the marketplace API.
//!
//! # Running Tests
//!
//! ```bash
//! # Apply migrations and start the server
//! cargo run -p marketplace-cli -- migrate
//! cargo run -p marketplace-api
//!
//! # Run integration tests
//! cargo test -p marketplace-integration-tests -- --ignored
//! ```
//!
//! The server under test must use `binary` image storage (the default).
//! `MARKETPLACE_TEST_URL` overrides the server address.

use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

/// Password used for every test account.
pub const TEST_PASSWORD: &str = "integration-pass-1";

/// Base URL of the API under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("MARKETPLACE_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// Absolute URL for an `/api` path.
#[must_use]
pub fn api(path: &str) -> String {
    format!("{}/api{path}", base_url())
}

/// A fresh mobile number, `09` followed by nine digits.
#[must_use]
pub fn unique_phone() -> String {
    let n = Uuid::new_v4().as_u128() % 1_000_000_000;
    format!("09{n:09}")
}

/// A client that keeps the session cookie between requests.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Read a JSON body, asserting the status first.
///
/// # Panics
///
/// Panics on an unexpected status or a non-JSON body.
pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    let actual = response.status();
    let body: Value = response.json().await.expect("Failed to read JSON body");
    assert_eq!(actual, status, "unexpected status, body: {body}");
    body
}

/// Register and log in a customer. Returns the client and the user JSON.
///
/// # Panics
///
/// Panics if registration fails.
pub async fn customer() -> (Client, Value) {
    let client = client();
    let response = client
        .post(api("/auth/register"))
        .json(&json!({
            "first_name": "Test",
            "last_name": "Customer",
            "phone": unique_phone(),
            "password": TEST_PASSWORD,
        }))
        .send()
        .await
        .expect("Failed to register customer");
    let user = expect_json(response, StatusCode::CREATED).await;
    (client, user)
}

/// Register and log in a store owner. Returns the client and the user JSON.
///
/// # Panics
///
/// Panics if registration fails.
pub async fn store_owner(store_name: &str) -> (Client, Value) {
    let client = client();
    let response = client
        .post(api("/auth/register/store-owner"))
        .json(&json!({
            "first_name": "Test",
            "last_name": "Seller",
            "phone": unique_phone(),
            "password": TEST_PASSWORD,
            "store_name": store_name,
        }))
        .send()
        .await
        .expect("Failed to register store owner");
    let user = expect_json(response, StatusCode::CREATED).await;
    (client, user)
}

/// List a product as the logged-in store owner. Returns the product JSON.
///
/// # Panics
///
/// Panics if creation fails.
pub async fn create_product(seller: &Client, price: &str, stock: u32) -> Value {
    let response = seller
        .post(api("/products"))
        .json(&json!({
            "title": "Linen shirt",
            "description": "Breathable summer shirt",
            "sku": format!("SKU-{}", Uuid::new_v4().simple()),
            "price": price,
            "stock": stock,
            "category": "men",
        }))
        .send()
        .await
        .expect("Failed to create product");
    expect_json(response, StatusCode::CREATED).await
}

/// Numeric `id` field of a JSON object.
///
/// # Panics
///
/// Panics if the field is missing.
#[must_use]
pub fn id_of(value: &Value) -> i64 {
    value["id"].as_i64().expect("object has no numeric id")
}
