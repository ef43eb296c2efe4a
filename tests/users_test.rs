//! User preference endpoint tests.

mod common;

use common::{register_and_login, TestHarness};
use std::net::SocketAddr;

/// Log in and return both the token and the account's id.
async fn login_with_id(addr: SocketAddr, username: &str) -> (String, String) {
    let resp: serde_json::Value = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/auth/login"))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    (
        resp["token"].as_str().unwrap().to_string(),
        resp["user"]["id"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn preferences_default_and_update() {
    let (_h, addr) = TestHarness::with_server().await;
    register_and_login(addr, "alice").await;
    let (token, user_id) = login_with_id(addr, "alice").await;
    let client = reqwest::Client::new();

    // A fresh account starts with the defaults.
    let resp = client
        .get(format!("http://{addr}/api/v1/users/{user_id}/preferences"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let prefs: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(prefs["default_format"], "h264");
    assert_eq!(prefs["default_resolution"], "720p");
    assert_eq!(prefs["notifications_enabled"], true);
    assert_eq!(prefs["auto_delete_originals"], false);

    // Omitted fields fall back to defaults, not the stored values.
    let resp = client
        .put(format!("http://{addr}/api/v1/users/{user_id}/preferences"))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "default_format": "vp9",
            "default_resolution": "1080p",
            "notifications_enabled": false,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let prefs: serde_json::Value = client
        .get(format!("http://{addr}/api/v1/users/{user_id}/preferences"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(prefs["default_format"], "vp9");
    assert_eq!(prefs["default_resolution"], "1080p");
    assert_eq!(prefs["default_quality"], "medium");
    assert_eq!(prefs["notifications_enabled"], false);
}

#[tokio::test]
async fn preferences_reject_unknown_format() {
    let (_h, addr) = TestHarness::with_server().await;
    register_and_login(addr, "alice").await;
    let (token, user_id) = login_with_id(addr, "alice").await;

    let resp = reqwest::Client::new()
        .put(format!("http://{addr}/api/v1/users/{user_id}/preferences"))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "default_format": "divx" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn preferences_are_owner_or_admin_only() {
    let (_h, addr) = TestHarness::with_server().await;
    register_and_login(addr, "alice").await;
    register_and_login(addr, "bob").await;
    let (_alice_token, alice_id) = login_with_id(addr, "alice").await;
    let (bob_token, _) = login_with_id(addr, "bob").await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("http://{addr}/api/v1/users/{alice_id}/preferences"))
        .bearer_auth(&bob_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let admin_token = common::login(addr, "admin", "admin123").await;
    let resp = client
        .get(format!("http://{addr}/api/v1/users/{alice_id}/preferences"))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}
