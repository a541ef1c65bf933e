//! Integration tests for product, seller and store ratings.
//!
//! These tests require a running `PostgreSQL` database and the API server
//! (cargo run -p marketplace-api).

#![allow(clippy::unwrap_used)]

use marketplace_integration_tests::{
    api, create_product, customer, expect_json, id_of, store_owner,
};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_product_rating_average() {
    let (seller, _) = store_owner("Rated Store").await;
    let product = create_product(&seller, "10.00", 5).await;
    let url = api(&format!("/products/{}/rate", id_of(&product)));

    for rating in ["4", "5"] {
        let (buyer, _) = customer().await;
        let response = buyer
            .post(&url)
            .json(&json!({ "rating": rating }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let detail = reqwest::get(api(&format!("/products/{}", id_of(&product))))
        .await
        .unwrap();
    let detail = expect_json(detail, StatusCode::OK).await;
    assert_eq!(detail["rating"]["count"], 2);
    let average: f64 = detail["rating"]["average"].as_str().unwrap().parse().unwrap();
    assert!((average - 4.5).abs() < f64::EPSILON);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_second_product_rating_conflicts() {
    let (seller, _) = store_owner("Once Store").await;
    let product = create_product(&seller, "10.00", 5).await;
    let url = api(&format!("/products/{}/rate", id_of(&product)));
    let (buyer, _) = customer().await;

    let first = buyer.post(&url).json(&json!({ "rating": "3" })).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = buyer.post(&url).json(&json!({ "rating": "5" })).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_rating_out_of_range() {
    let (seller, _) = store_owner("Range Store").await;
    let product = create_product(&seller, "10.00", 5).await;
    let (buyer, _) = customer().await;

    for rating in ["0", "5.5"] {
        let response = buyer
            .post(api(&format!("/products/{}/rate", id_of(&product))))
            .json(&json!({ "rating": rating }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_seller_and_store_ratings_are_separate() {
    let (_, seller) = store_owner("Two Ratings").await;
    let (buyer, _) = customer().await;
    let id = id_of(&seller);

    let seller_rating = buyer
        .post(api(&format!("/store-owners/{id}/rate-seller")))
        .json(&json!({ "rating": "2" }))
        .send()
        .await
        .unwrap();
    let seller_rating = expect_json(seller_rating, StatusCode::OK).await;
    assert_eq!(seller_rating["count"], 1);

    let store = reqwest::get(api(&format!("/store-owners/{id}"))).await.unwrap();
    let store = expect_json(store, StatusCode::OK).await;
    assert_eq!(store["seller_rating"]["count"], 1);
    assert_eq!(store["store_rating"]["count"], 0);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_view_counter_increments() {
    let (seller, _) = store_owner("Viewed Store").await;
    let product = create_product(&seller, "1.00", 1).await;
    let url = api(&format!("/products/{}/view", id_of(&product)));

    let client = reqwest::Client::new();
    let first = expect_json(client.post(&url).send().await.unwrap(), StatusCode::OK).await;
    let second = expect_json(client.post(&url).send().await.unwrap(), StatusCode::OK).await;
    assert_eq!(
        second["views"].as_u64().unwrap(),
        first["views"].as_u64().unwrap() + 1
    );
}
