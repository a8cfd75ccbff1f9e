//! Integration tests for the notes and links dashboard and public sharing.

mod common;

use axum::http::StatusCode;
use common::*;
use giftbox::db::UserRole;
use serde_json::json;

#[tokio::test]
async fn test_notes_require_token() {
    let app = TestApp::new().await;

    let response = app.send(public_get("/notes")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.send(get_request("/notes", "gb_abcd1234_notreal")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(extract_json(response).await["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_token_in_query_string() {
    let app = TestApp::new().await;
    let token = create_test_token(app.db(), "Dee", UserRole::Member).await;

    let uri = format!("/notes?token={}", urlencoding::encode(&token));
    let response = app.send(public_get(&uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_note_crud_and_slug_lifecycle() {
    let app = TestApp::new().await;
    let token = create_test_token(app.db(), "Dee", UserRole::Member).await;

    // Private notes have no slug
    let response = app
        .send(post_json(
            "/notes",
            &token,
            json!({ "title": "Trip ideas", "content": "Lisbon", "tags": ["#Travel", "travel", " Food "] }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let note = extract_json(response).await;
    let id = note["id"].as_str().unwrap().to_string();
    assert!(note["slug"].is_null());
    assert_eq!(note["tags"], json!(["travel", "food"]));

    // Going public mints a slug
    let response = app
        .send(put_json(&format!("/notes/{}", id), &token, json!({ "is_public": true })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let note = extract_json(response).await;
    let slug = note["slug"].as_str().unwrap().to_string();
    assert!(slug.starts_with("trip-ideas-"));
    assert_eq!(note["content"], "Lisbon");

    // Renaming keeps the slug
    let response = app
        .send(put_json(&format!("/notes/{}", id), &token, json!({ "title": "Summer trip" })))
        .await;
    assert_eq!(extract_json(response).await["slug"], slug.as_str());

    let response = app.send(public_get(&format!("/shared/notes/{}", slug))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let shared = extract_json(response).await;
    assert_eq!(shared["title"], "Summer trip");
    assert!(shared.get("author_id").is_none());

    // Going private clears it and hides the note
    let response = app
        .send(put_json(&format!("/notes/{}", id), &token, json!({ "is_public": false })))
        .await;
    assert!(extract_json(response).await["slug"].is_null());

    let response = app.send(public_get(&format!("/shared/notes/{}", slug))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(delete_request(&format!("/notes/{}", id), &token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(get_request(&format!("/notes/{}", id), &token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_notes_are_scoped_to_author() {
    let app = TestApp::new().await;
    let dee = create_test_token(app.db(), "Dee", UserRole::Member).await;
    let eli = create_test_token(app.db(), "Eli", UserRole::Member).await;

    let response = app
        .send(post_json("/notes", &dee, json!({ "title": "Private plan" })))
        .await;
    let id = extract_json(response).await["id"].as_str().unwrap().to_string();

    let response = app.send(get_request(&format!("/notes/{}", id), &eli)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(delete_request(&format!("/notes/{}", id), &eli))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.send(get_request("/notes", &eli)).await;
    assert_eq!(extract_json(response).await["notes"], json!([]));
}

#[tokio::test]
async fn test_note_list_filters() {
    let app = TestApp::new().await;
    let token = create_test_token(app.db(), "Dee", UserRole::Member).await;

    for (title, public, tags) in [
        ("Recipes", true, vec!["food"]),
        ("Reading list", false, vec!["books"]),
        ("Restaurants", false, vec!["food", "city"]),
    ] {
        let response = app
            .send(post_json(
                "/notes",
                &token,
                json!({ "title": title, "is_public": public, "tags": tags }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.send(get_request("/notes?tag=food", &token)).await;
    assert_eq!(extract_json(response).await["notes"].as_array().unwrap().len(), 2);

    let response = app.send(get_request("/notes?public=true", &token)).await;
    let notes = extract_json(response).await["notes"].clone();
    assert_eq!(notes.as_array().unwrap().len(), 1);
    assert_eq!(notes[0]["title"], "Recipes");

    let response = app.send(get_request("/notes?q=read", &token)).await;
    assert_eq!(extract_json(response).await["notes"].as_array().unwrap().len(), 1);

    let response = app.send(get_request("/notes?limit=1", &token)).await;
    assert_eq!(extract_json(response).await["notes"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_links_validate_url_and_share() {
    let app = TestApp::new().await;
    let token = create_test_token(app.db(), "Dee", UserRole::Member).await;

    let response = app
        .send(post_json("/links", &token, json!({ "url": "javascript:alert(1)" })))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(post_json(
            "/links",
            &token,
            json!({ "url": "https://www.rust-lang.org/learn", "title": "Learn Rust", "is_public": true }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let link = extract_json(response).await;
    let slug = link["slug"].as_str().unwrap().to_string();

    let response = app.send(public_get(&format!("/shared/links/{}", slug))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response).await["url"], "https://www.rust-lang.org/learn");

    // The deep link falls through to links when no note matches
    let response = app.send(public_get(&format!("/shared?slug={}", slug))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let item = extract_json(response).await;
    assert_eq!(item["kind"], "link");
    assert_eq!(item["title"], "Learn Rust");

    let response = app.send(public_get("/shared?slug=nothing-here")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_link_update_and_list() {
    let app = TestApp::new().await;
    let token = create_test_token(app.db(), "Dee", UserRole::Member).await;

    let response = app
        .send(post_json(
            "/links",
            &token,
            json!({ "url": "https://example.com/a", "tags": ["docs"] }),
        ))
        .await;
    let link = extract_json(response).await;
    let id = link["id"].as_str().unwrap().to_string();
    assert_eq!(link["title"], "https://example.com/a");

    let response = app
        .send(put_json(
            &format!("/links/{}", id),
            &token,
            json!({ "title": "Example docs", "url": "http://example.com/b" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let link = extract_json(response).await;
    assert_eq!(link["url"], "http://example.com/b");
    assert_eq!(link["tags"], json!(["docs"]));

    let response = app.send(get_request("/links?tag=docs", &token)).await;
    assert_eq!(extract_json(response).await["links"].as_array().unwrap().len(), 1);

    let response = app
        .send(delete_request(&format!("/links/{}", id), &token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
