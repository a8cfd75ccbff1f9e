//! Integration tests for the admin dashboard routes.

mod common;

use axum::http::StatusCode;
use common::*;
use giftbox::db::{self, UserRole};
use serde_json::json;

async fn admin_app() -> (TestApp, String) {
    let app = TestApp::new().await;
    let token = create_test_token(app.db(), "Merchant", UserRole::Admin).await;
    (app, token)
}

#[tokio::test]
async fn test_admin_requires_admin_role() {
    let app = TestApp::new().await;
    let member = create_test_token(app.db(), "Dee", UserRole::Member).await;

    let response = app.send(public_get("/admin/gifts")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(get_request("/admin/gifts", &member)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_gift_generates_pin() {
    let (app, token) = admin_app().await;

    let response = app
        .send(post_json(
            "/admin/gifts",
            &token,
            json!({
                "recipient_name": "Ada",
                "sender_name": "Lin",
                "product_type": "audio",
                "audio_url": "https://cdn.example.com/voice.mp3"
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let gift = extract_json(response).await;
    let pin = gift["access_pin"].as_str().unwrap();
    assert_eq!(pin.len(), 6);
    assert!(pin.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(gift["locked"], true);
    assert_eq!(gift["image_urls"], json!([]));
}

#[tokio::test]
async fn test_create_gift_validates_content() {
    let (app, token) = admin_app().await;

    for body in [
        json!({ "recipient_name": "Ada", "sender_name": "Lin", "product_type": "video" }),
        json!({ "recipient_name": "Ada", "sender_name": "Lin", "product_type": "gallery", "image_urls": [" "] }),
        json!({ "recipient_name": "Ada", "sender_name": "Lin", "product_type": "hologram", "message": "hi" }),
        json!({ "recipient_name": " ", "sender_name": "Lin", "product_type": "markdown", "message": "hi" }),
    ] {
        let response = app.send(post_json("/admin/gifts", &token, body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_update_and_delete_gift() {
    let (app, token) = admin_app().await;
    create_test_gift(app.db(), "gift-edit", "1234", true).await;

    let response = app
        .send(put_json(
            "/admin/gifts/gift-edit",
            &token,
            json!({ "sender_name": "Grace", "unlock_date": "2031-06-01T09:00:00Z", "disabled": true }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let gift = extract_json(response).await;
    assert_eq!(gift["sender_name"], "Grace");
    assert_eq!(gift["disabled"], true);
    assert!(gift["unlock_date"].is_string());

    // Switching to audio without an audio_url breaks the content rule
    let response = app
        .send(put_json(
            "/admin/gifts/gift-edit",
            &token,
            json!({ "product_type": "audio" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(put_json("/admin/gifts/gift-edit", &token, json!({ "unlock_date": null })))
        .await;
    assert!(extract_json(response).await["unlock_date"].is_null());

    let response = app.send(delete_request("/admin/gifts/gift-edit", &token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(get_request("/admin/gifts/gift-edit", &token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_gift_cascades_to_contributions() {
    let (app, token) = admin_app().await;
    create_test_gift(app.db(), "gift-cascade", "1234", true).await;

    let response = app
        .send(public_post_json(
            "/gifts/gift-cascade/contributions",
            json!({ "author": "Grace", "kind": "text", "content": "Hi" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    app.send(delete_request("/admin/gifts/gift-cascade", &token)).await;

    let (remaining,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM contributions WHERE gift_id = 'gift-cascade'")
            .fetch_one(app.db())
            .await
            .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn test_reset_attempts_lifts_lockout() {
    let (app, token) = admin_app().await;
    create_test_gift(app.db(), "gift-reset", "1234", true).await;

    for _ in 0..3 {
        app.send(public_post_json("/gifts/gift-reset/unlock", json!({ "pin": "9999" })))
            .await;
    }
    let response = app
        .send(public_post_json("/gifts/gift-reset/unlock", json!({ "pin": "1234" })))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let response = app
        .send(post_json("/admin/gifts/gift-reset/reset-attempts", &token, json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(public_post_json("/gifts/gift-reset/unlock", json!({ "pin": "1234" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_contribution() {
    let (app, token) = admin_app().await;
    create_test_gift(app.db(), "gift-mod", "1234", true).await;

    let response = app
        .send(public_post_json(
            "/gifts/gift-mod/contributions",
            json!({ "author": "Troll", "kind": "text", "content": "spam" }),
        ))
        .await;
    let id = extract_json(response).await["id"].as_str().unwrap().to_string();

    let response = app
        .send(delete_request(&format!("/admin/contributions/{}", id), &token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(delete_request(&format!("/admin/contributions/{}", id), &token))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_filters_and_stats() {
    let (app, token) = admin_app().await;
    create_test_gift(app.db(), "gift-1", "1234", true).await;
    create_test_gift(app.db(), "gift-2", "1234", false).await;
    db::mark_gift_viewed(app.db(), "gift-2", chrono::Utc::now())
        .await
        .unwrap();

    let response = app.send(get_request("/admin/gifts?viewed=true", &token)).await;
    let gifts = extract_json(response).await["gifts"].clone();
    assert_eq!(gifts.as_array().unwrap().len(), 1);
    assert_eq!(gifts[0]["id"], "gift-2");

    let response = app
        .send(get_request("/admin/gifts?product_type=markdown&q=ada", &token))
        .await;
    assert_eq!(extract_json(response).await["gifts"].as_array().unwrap().len(), 2);

    let response = app.send(get_request("/admin/stats", &token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stats = extract_json(response).await;
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["viewed"], 1);
    assert_eq!(stats["paid"], 0);
    assert_eq!(stats["by_product_type"]["markdown"], 2);
    assert_eq!(stats["by_product_type"]["audio"], 0);
}
