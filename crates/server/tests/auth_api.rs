//! Authentication integration tests: API key validation and per-credential
//! ownership scoping.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{TestConfig, TestFixture};
use fabrica_core::JobStore;

fn keys() -> TestConfig {
    TestConfig::with_api_keys(&[("alice-key", "alice"), ("bob-key", "bob")])
}

fn text_body(prompt: &str) -> serde_json::Value {
    json!({
        "input_type": "text",
        "creation_type": "general",
        "text_input": prompt
    })
}

#[tokio::test]
async fn test_missing_credentials_are_unauthorized() {
    let fixture = TestFixture::with_config(keys()).await;

    let response = fixture.post("/api/creations/create", text_body("a cat")).await;
    assert_status!(response, StatusCode::UNAUTHORIZED);

    let response = fixture.get("/api/pricing").await;
    assert_status!(response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_key_is_unauthorized() {
    let fixture = TestFixture::with_config(keys()).await;

    let response = fixture
        .get_with_header("/api/pricing", "Authorization", "Bearer nope")
        .await;
    assert_status!(response, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_needs_no_credentials() {
    let fixture = TestFixture::with_config(keys()).await;

    let response = fixture.get("/health").await;
    assert_status!(response, StatusCode::OK);
}

#[tokio::test]
async fn test_valid_key_submits_as_its_user() {
    let fixture = TestFixture::with_config(keys()).await;

    let response = fixture
        .post_with_header(
            "/api/creations/create",
            text_body("a cat"),
            "Authorization",
            "Bearer alice-key",
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);

    let creation_id = response.body["creation_id"].as_str().unwrap().to_string();
    let job = fixture.job_store.get(&creation_id).unwrap().unwrap();
    assert_eq!(job.owner, "alice");

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_jobs_are_invisible_across_credentials() {
    let fixture = TestFixture::with_config(keys()).await;

    let response = fixture
        .post_with_header(
            "/api/creations/create",
            text_body("a cat"),
            "Authorization",
            "Bearer alice-key",
        )
        .await;
    assert_status!(response, StatusCode::ACCEPTED);
    let creation_id = response.body["creation_id"].as_str().unwrap().to_string();

    // Alice sees her job.
    let response = fixture
        .get_with_header(
            &format!("/api/creations/{}", creation_id),
            "Authorization",
            "Bearer alice-key",
        )
        .await;
    assert_status!(response, StatusCode::OK);

    // Bob gets NotFound, indistinguishable from an unknown id.
    let response = fixture
        .get_with_header(
            &format!("/api/creations/{}", creation_id),
            "Authorization",
            "Bearer bob-key",
        )
        .await;
    assert_status!(response, StatusCode::NOT_FOUND);

    // And Bob's listing is empty.
    let response = fixture
        .get_with_header("/api/creations", "Authorization", "Bearer bob-key")
        .await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["total"], 0);

    fixture.shutdown().await;
}

#[tokio::test]
async fn test_rate_limit_buckets_are_per_credential() {
    let mut config = TestConfig::with_create_burst(1);
    config.api_keys = keys().api_keys;
    let fixture = TestFixture::with_config(config).await;

    let first = fixture
        .post_with_header(
            "/api/creations/create",
            text_body("one"),
            "Authorization",
            "Bearer alice-key",
        )
        .await;
    assert_status!(first, StatusCode::ACCEPTED);

    // Alice is out of tokens; Bob has his own bucket.
    let second = fixture
        .post_with_header(
            "/api/creations/create",
            text_body("two"),
            "Authorization",
            "Bearer alice-key",
        )
        .await;
    assert_status!(second, StatusCode::TOO_MANY_REQUESTS);

    let bob = fixture
        .post_with_header(
            "/api/creations/create",
            text_body("three"),
            "Authorization",
            "Bearer bob-key",
        )
        .await;
    assert_status!(bob, StatusCode::ACCEPTED);

    fixture.shutdown().await;
}
