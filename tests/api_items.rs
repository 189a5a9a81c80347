mod common;

use axum::http::StatusCode;
use common::{bearer, spawn_app};
use serde_json::{Value, json};

#[tokio::test]
async fn test_create_and_get_item() {
    let app = spawn_app();
    let (user, token) = app.user("seller@example.com").await;

    let id = app.create_item(&token, "Lamp", "19.99").await;

    let response = app
        .server
        .get(&format!("/api/v1/items/{}", id))
        .add_header("Authorization", bearer(&token))
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["title"], "Lamp");
    assert_eq!(json["price"], "19.99");
    assert_eq!(json["owner_id"], user.id);
}

#[tokio::test]
async fn test_item_price_must_be_positive() {
    let app = spawn_app();
    let (_, token) = app.user("seller@example.com").await;

    for price in ["0", "-1.50"] {
        app.server
            .post("/api/v1/items")
            .add_header("Authorization", bearer(&token))
            .json(&json!({ "title": "Free lunch", "price": price }))
            .await
            .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn test_list_items_paginates() {
    let app = spawn_app();
    let (_, token) = app.user("seller@example.com").await;

    let items: Vec<Value> = (1..=15)
        .map(|n| json!({ "title": format!("Item {}", n), "price": "1.00" }))
        .collect();
    let bulk = app
        .server
        .post("/api/v1/items/bulk")
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "items": items }))
        .await;
    bulk.assert_status(StatusCode::CREATED);

    let created = bulk.json::<Value>();
    let ids: Vec<i64> = created
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids.len(), 15);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    let first = app
        .server
        .get("/api/v1/items?limit=10")
        .add_header("Authorization", bearer(&token))
        .await;
    first.assert_status_ok();
    let first = first.json::<Value>();
    assert_eq!(first["items"].as_array().unwrap().len(), 10);
    assert_eq!(first["total"], 15);

    let second = app
        .server
        .get("/api/v1/items?skip=10&limit=10")
        .add_header("Authorization", bearer(&token))
        .await
        .json::<Value>();
    assert_eq!(second["items"].as_array().unwrap().len(), 5);
    assert_eq!(second["items"][0]["title"], "Item 11");
}

#[tokio::test]
async fn test_list_items_filters_by_owner() {
    let app = spawn_app();
    let (alice, alice_token) = app.user("alice@example.com").await;
    let (_, bob_token) = app.user("bob@example.com").await;

    app.create_item(&alice_token, "Alice's lamp", "5").await;
    app.create_item(&bob_token, "Bob's desk", "50").await;

    let response = app
        .server
        .get(&format!("/api/v1/items?owner_id={}", alice.id))
        .add_header("Authorization", bearer(&bob_token))
        .await;
    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["total"], 1);
    assert_eq!(json["items"][0]["title"], "Alice's lamp");
}

#[tokio::test]
async fn test_update_item_by_owner_refreshes_cached_item() {
    let app = spawn_app();
    let (_, token) = app.user("seller@example.com").await;
    let id = app.create_item(&token, "Lamp", "19.99").await;
    let path = format!("/api/v1/items/{}", id);

    // Prime the cache.
    app.server
        .get(&path)
        .add_header("Authorization", bearer(&token))
        .await
        .assert_status_ok();

    app.server
        .patch(&path)
        .add_header("Authorization", bearer(&token))
        .json(&json!({ "title": "Desk lamp", "price": "24.50", "description": "Brass" }))
        .await
        .assert_status_ok();

    let json = app
        .server
        .get(&path)
        .add_header("Authorization", bearer(&token))
        .await
        .json::<Value>();
    assert_eq!(json["title"], "Desk lamp");
    assert_eq!(json["price"], "24.50");
    assert_eq!(json["description"], "Brass");
}

#[tokio::test]
async fn test_update_item_permissions() {
    let app = spawn_app();
    let (_, owner) = app.user("owner@example.com").await;
    let (_, stranger) = app.user("stranger@example.com").await;
    let (_, admin) = app.admin("admin@example.com").await;
    let path = format!("/api/v1/items/{}", app.create_item(&owner, "Lamp", "10").await);

    app.server
        .patch(&path)
        .add_header("Authorization", bearer(&stranger))
        .json(&json!({ "title": "Mine now" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .patch(&path)
        .add_header("Authorization", bearer(&admin))
        .json(&json!({ "title": "Moderated" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_get_missing_item_is_not_found() {
    let app = spawn_app();
    let (_, token) = app.user("seller@example.com").await;

    app.server
        .get("/api/v1/items/424242")
        .add_header("Authorization", bearer(&token))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_malformed_item_id_is_a_validation_error() {
    let app = spawn_app();
    let (_, token) = app.user("seller@example.com").await;

    let response = app
        .server
        .get("/api/v1/items/not-a-number")
        .add_header("Authorization", bearer(&token))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "validation_error");
    assert!(json["error"]["details"]["reason"].is_string());
}
