//! Integration tests for product galleries, categories and comments.
//!
//! These tests require a running `PostgreSQL` database and the API server
//! (cargo run -p marketplace-api).

#![allow(clippy::unwrap_used)]

use marketplace_integration_tests::{
    api, create_product, customer, expect_json, id_of, store_owner,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, header};
use serde_json::json;

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

fn image_form(bytes: &[u8], filename: &str, content_type: &str) -> Form {
    let part = Part::bytes(bytes.to_vec())
        .file_name(filename.to_owned())
        .mime_str(content_type)
        .unwrap();
    Form::new().part("file", part)
}

async fn upload(seller: &Client, product_id: i64, filename: &str) -> reqwest::Response {
    seller
        .post(api(&format!("/products/{product_id}/images")))
        .multipart(image_form(PNG_BYTES, filename, "image/png"))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_gallery_keeps_one_primary() {
    let (seller, _) = store_owner("Gallery Store").await;
    let id = id_of(&create_product(&seller, "20.00", 2).await);

    let first = expect_json(upload(&seller, id, "front.png").await, StatusCode::CREATED).await;
    let second = expect_json(upload(&seller, id, "back.png").await, StatusCode::CREATED).await;
    assert_eq!(first["is_primary"], true);
    assert_eq!(second["is_primary"], false);

    let primary = seller
        .put(api(&format!("/products/{id}/images/{}/primary", id_of(&second))))
        .send()
        .await
        .unwrap();
    assert_eq!(expect_json(primary, StatusCode::OK).await["is_primary"], true);

    let detail = reqwest::get(api(&format!("/products/{id}"))).await.unwrap();
    let detail = expect_json(detail, StatusCode::OK).await;
    let images = detail["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    let primaries: Vec<_> = images.iter().filter(|i| i["is_primary"] == true).collect();
    assert_eq!(primaries.len(), 1);
    assert_eq!(id_of(primaries[0]), id_of(&second));

    let removed = seller
        .delete(api(&format!("/products/{id}/images/{}", id_of(&second))))
        .send()
        .await
        .unwrap();
    let removed = expect_json(removed, StatusCode::OK).await;
    assert_eq!(removed["promoted"].as_i64(), Some(id_of(&first)));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_gallery_image_is_served_inline() {
    let (seller, _) = store_owner("Served Store").await;
    let id = id_of(&create_product(&seller, "20.00", 2).await);
    let image = expect_json(upload(&seller, id, "front.png").await, StatusCode::CREATED).await;

    let response = reqwest::get(api(&format!("/products/{id}/images/{}", id_of(&image))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "inline; filename=\"front.png\""
    );
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    let csp = headers[header::CONTENT_SECURITY_POLICY].to_str().unwrap();
    assert!(csp.contains("sandbox"));
    assert_eq!(response.bytes().await.unwrap().as_ref(), PNG_BYTES);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_svg_upload_is_refused() {
    let (seller, user) = store_owner("Vector Store").await;
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" onload="alert(document.cookie)"/>"#;

    let logo = seller
        .post(api(&format!("/store-owners/{}/logo", id_of(&user))))
        .multipart(image_form(svg, "logo.svg", "image/svg+xml"))
        .send()
        .await
        .unwrap();
    assert_eq!(logo.status(), StatusCode::BAD_REQUEST);

    let id = id_of(&create_product(&seller, "20.00", 2).await);
    let gallery = seller
        .post(api(&format!("/products/{id}/images")))
        .multipart(image_form(svg, "shirt.svg", "image/svg+xml"))
        .send()
        .await
        .unwrap();
    assert_eq!(gallery.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_only_owner_edits_gallery() {
    let (seller, _) = store_owner("Guarded Store").await;
    let id = id_of(&create_product(&seller, "20.00", 2).await);
    let (buyer, _) = customer().await;

    assert_eq!(upload(&buyer, id, "mine.png").await.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_categories_count_listed_products() {
    let categories = reqwest::get(api("/categories")).await.unwrap();
    let before = expect_json(categories, StatusCode::OK).await;
    let men_before = before
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["category"] == "men")
        .unwrap()["product_count"]
        .as_u64()
        .unwrap();
    assert_eq!(before.as_array().unwrap().len(), 5);

    let (seller, _) = store_owner("Menswear").await;
    create_product(&seller, "30.00", 1).await;

    let after = reqwest::get(api("/categories")).await.unwrap();
    let after = expect_json(after, StatusCode::OK).await;
    let men_after = after
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["category"] == "men")
        .unwrap()["product_count"]
        .as_u64()
        .unwrap();
    assert!(men_after > men_before);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_comment_edit_by_author_only() {
    let (seller, _) = store_owner("Talk Store").await;
    let id = id_of(&create_product(&seller, "20.00", 2).await);
    let (author, _) = customer().await;

    let posted = author
        .post(api(&format!("/products/{id}/comments")))
        .json(&json!({ "content": "Does it run small?" }))
        .send()
        .await
        .unwrap();
    let comment_id = id_of(&expect_json(posted, StatusCode::CREATED).await);
    let url = api(&format!("/comments/{comment_id}"));

    let (stranger, _) = customer().await;
    let denied = stranger
        .patch(&url)
        .json(&json!({ "content": "Hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let empty = author
        .patch(&url)
        .json(&json!({ "content": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let edited = author
        .patch(&url)
        .json(&json!({ "content": "Does it run large?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(
        expect_json(edited, StatusCode::OK).await["content"],
        "Does it run large?"
    );

    let fetched = expect_json(reqwest::get(&url).await.unwrap(), StatusCode::OK).await;
    assert_eq!(fetched["content"], "Does it run large?");
    assert_eq!(fetched["product_id"], id);
}
