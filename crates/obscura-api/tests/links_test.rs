//! Ephemeral-link API tests.
//!
//! Run with: `cargo test -p obscura-api --test links_test`

mod helpers;

use chrono::{DateTime, Duration, Utc};
use helpers::{setup_test_app, TEST_ACCESS_TOKEN};
use obscura_core::models::EphemeralLinkResponse;
use serde_json::json;

#[tokio::test]
async fn link_creation_with_duration_returns_path_and_expiry() {
    let app = setup_test_app().await;
    let now = Utc::now();

    let response = app
        .server
        .post("/admin/ephemeral-links")
        .add_header("X-Access-Token", TEST_ACCESS_TOKEN)
        .json(&json!({ "sinceNow": "P2DT3H" }))
        .await;

    assert_eq!(response.status_code(), 200);
    let link: EphemeralLinkResponse = response.json();

    let token = link
        .relative_path
        .strip_prefix("/uploads/")
        .expect("path under the upload prefix");
    assert_eq!(token.len(), 48);
    assert!(token.chars().all(|c| c.is_ascii_alphabetic()));

    let expiry = DateTime::parse_from_rfc3339(&link.expires_on).expect("RFC 3339 expiry");
    let diff = (expiry.with_timezone(&Utc) - now).num_seconds();
    assert!((diff - 183_600).abs() <= 2, "expiry off by {diff} seconds");
}

#[tokio::test]
async fn wrong_access_token_is_forbidden() {
    let app = setup_test_app().await;

    let response = app
        .server
        .post("/admin/ephemeral-links")
        .add_header("X-Access-Token", "not-the-secret")
        .json(&json!({ "sinceNow": "P2DT3H" }))
        .await;
    assert_eq!(response.status_code(), 403);

    let response = app
        .server
        .post("/admin/ephemeral-links")
        .json(&json!({ "sinceNow": "P2DT3H" }))
        .await;
    assert_eq!(response.status_code(), 403);
}

#[tokio::test]
async fn expiry_below_the_floor_is_rejected() {
    let app = setup_test_app().await;
    let soon = (Utc::now() + Duration::seconds(10)).to_rfc3339();

    let response = app
        .server
        .post("/admin/ephemeral-links")
        .add_header("X-Access-Token", TEST_ACCESS_TOKEN)
        .json(&json!({ "sinceNow": "bogus", "timeExact": soon }))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: serde_json::Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unparseable_body_is_a_bad_request() {
    let app = setup_test_app().await;

    let response = app
        .server
        .post("/admin/ephemeral-links")
        .add_header("X-Access-Token", TEST_ACCESS_TOKEN)
        .text("{not json")
        .await;

    assert_eq!(response.status_code(), 400);
}
