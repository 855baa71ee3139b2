// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Protected routes accept session cookies and bearer tokens
//! 3. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;

const USER_ID: &str = "5d8a1c2b3e4f5a6b7c8d9e0f";
const CLUB_ID: &str = "5d8a1c2b3e4f5a6b7c8d9e10";

/// Create a test JWT token with an explicit expiry offset.
fn create_test_jwt(user_id: &str, signing_key: &[u8], expires_in: i64) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;

    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + expires_in) as usize,
        iat: now as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .unwrap()
}

fn membership_request(auth: Option<(header::HeaderName, String)>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(format!("/clubs/{}/membership", CLUB_ID))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some((name, value)) = auth {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(r#"{"isMember": true}"#))
        .unwrap()
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _) = common::create_test_app();

    let response = app.oneshot(membership_request(None)).await.unwrap();

    // Should return 401 Unauthorized without token
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::json_body(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(membership_request(Some((
            header::AUTHORIZATION,
            "Bearer invalid.token.here".to_string(),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = common::json_body(response).await;
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_protected_route_with_expired_token() {
    let (app, state) = common::create_test_app();
    let token = create_test_jwt(USER_ID, &state.config.jwt_signing_key, -3600);

    let response = app
        .oneshot(membership_request(Some((
            header::COOKIE,
            format!("caravan_session={}", token),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_foreign_key_token() {
    let (app, _) = common::create_test_app();
    let token = create_test_jwt(USER_ID, b"some other signing key", 3600);

    let response = app
        .oneshot(membership_request(Some((
            header::AUTHORIZATION,
            format!("Bearer {}", token),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_valid_cookie() {
    let (app, state) = common::create_test_app();
    let cookie = common::session_cookie(USER_ID, &state);

    let response = app
        .oneshot(membership_request(Some((header::COOKIE, cookie))))
        .await
        .unwrap();

    // Authentication passes; loading the user then fails on the offline
    // database. The key check is that we DON'T get 401.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_protected_route_with_valid_bearer() {
    let (app, state) = common::create_test_app();
    let token = create_test_jwt(USER_ID, &state.config.jwt_signing_key, 3600);

    let response = app
        .oneshot(membership_request(Some((
            header::AUTHORIZATION,
            format!("Bearer {}", token),
        ))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/clubs")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // OPTIONS should return 200 (CORS preflight success)
    assert_eq!(response.status(), StatusCode::OK);

    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_rejects_unknown_origin() {
    let (app, _) = common::create_test_app_with_frontend_url("https://clubs.example");

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/clubs")
                .header(header::ORIGIN, "https://evil.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_public_route_no_auth_required() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["buildId"].is_string());
}

#[tokio::test]
async fn test_validate_permissions_requires_login() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/discord/validatePermissions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_validate_permissions_store_failure_requires_auth() {
    let (app, state) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/discord/validatePermissions")
                .header(header::COOKIE, common::session_cookie(USER_ID, &state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = common::json_body(response).await;
    assert_eq!(body["authRequired"], true);
}
