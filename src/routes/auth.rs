// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discord OAuth authentication routes.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{
    add_session_cookies, clear_referral_cookies, clear_session_cookies, create_jwt, REFERRAL_COOKIE,
};
use crate::middleware::MaybeAuthUser;
use crate::models::OAuthClient;
use crate::services::session::session_has_required_scopes;
use crate::services::LoginService;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

const CALLBACK_PATH: &str = "/auth/discord/callback";
/// OAuth round trips older than this are rejected.
const STATE_MAX_AGE_MS: u128 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/discord/login", get(login))
        .route(CALLBACK_PATH, get(callback))
        .route("/auth/discord/validatePermissions", get(validate_permissions))
        .route("/auth/logout", post(logout))
}

/// 302 redirect. The browser flow expects `Found`, not 303/307.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn now_millis() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

/// OAuth redirect URI: the configured one, or derived from the request host.
fn redirect_uri(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(uri) = &state.config.discord_redirect_uri {
        return uri.clone();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");
    let scheme = if host.contains("localhost") || host.contains("127.0.0.1") {
        "http"
    } else {
        "https"
    };
    format!("{}://{}{}", scheme, host, CALLBACK_PATH)
}

/// Sign the client's state so the callback can trust it came from us.
///
/// Format before encoding: `client_state|timestamp_hex|signature_hex`.
pub fn sign_state(client_state: &str, timestamp_ms: u128, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", client_state, timestamp_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify a signed state and return the client state it carries.
///
/// Returns `None` for anything tampered, malformed or older than
/// `STATE_MAX_AGE_MS` relative to `now_ms`.
pub fn verify_state(signed: &str, secret: &[u8], now_ms: u128) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(signed).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    // Split from the right; the client state may itself contain '|'.
    let mut parts = decoded.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let client_state = parts.next()?;

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", client_state, timestamp_hex).as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if !bool::from(expected.as_bytes().ct_eq(signature_hex.as_bytes())) {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_ms = u128::from_str_radix(timestamp_hex, 16).ok()?;
    if now_ms.saturating_sub(issued_ms) > STATE_MAX_AGE_MS {
        tracing::warn!("OAuth state expired");
        return None;
    }

    Some(client_state.to_string())
}

#[derive(Deserialize)]
pub struct LoginParams {
    #[serde(default)]
    state: Option<String>,
}

/// Start OAuth flow - redirect to Discord authorization.
async fn login(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoginParams>,
    headers: HeaderMap,
) -> Result<Response> {
    let client_state = params
        .state
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing state parameter".to_string()))?;

    let signed = sign_state(&client_state, now_millis()?, &state.config.oauth_state_key)?;
    let redirect_uri = redirect_uri(&state, &headers);

    tracing::info!(redirect_uri = %redirect_uri, "Starting OAuth flow, redirecting to Discord");
    Ok(found(&state.discord.authorize_url(&redirect_uri, &signed)))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth callback - sign the user in and send them back to the frontend.
///
/// Never fails with an error status: every failure clears the session
/// cookies and redirects with `error=`.
async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Response {
    let frontend = state.config.frontend_url.trim_end_matches('/');
    let fail = |jar: CookieJar, message: &str| {
        let location = format!("{}/?error={}", frontend, urlencoding::encode(message));
        (clear_session_cookies(jar, &state.config), found(&location)).into_response()
    };

    if let Some(error) = params.error {
        let description = params.error_description.unwrap_or(error);
        tracing::warn!(error = %description, "OAuth error from Discord");
        return fail(jar, &description);
    }

    let now = match now_millis() {
        Ok(now) => now,
        Err(e) => return fail(jar, &e.to_string()),
    };
    let Some(client_state) = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &state.config.oauth_state_key, now))
    else {
        return fail(jar, "Invalid OAuth state");
    };
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return fail(jar, "Missing authorization code");
    };

    let redirect_uri = redirect_uri(&state, &headers);
    let referral = jar.get(REFERRAL_COOKIE).map(|c| c.value().to_string());
    let outcome = match LoginService::new(&state)
        .complete_login(&code, &redirect_uri, referral.as_deref())
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Login failed");
            return fail(jar, "Could not authenticate");
        }
    };

    let user = outcome.user;
    let jwt = match create_jwt(&user.id, &state.config.jwt_signing_key) {
        Ok(jwt) => jwt,
        Err(e) => {
            tracing::error!(error = %e, "JWT creation failed");
            return fail(jar, "Could not authenticate");
        }
    };

    let mut jar = add_session_cookies(jar, &state.config, &user.id, &jwt);
    // A referral is only ever claimed by the account it brought in.
    if outcome.new_user && referral.is_some() {
        jar = clear_referral_cookies(jar, &state.config);
    }

    let location = format!("{}/?state={}", frontend, urlencoding::encode(&client_state));
    (jar, found(&location)).into_response()
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsResponse {
    pub auth_required: bool,
}

/// Whether the stored session is missing scopes and the user must re-consent.
async fn validate_permissions(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
) -> Result<Response> {
    let viewer = viewer.ok_or_else(|| AppError::BadRequest("Not logged in".to_string()))?;

    let response = match state.db.get_session(&viewer.user_id, OAuthClient::Discord).await {
        Ok(Some(session)) => (
            StatusCode::OK,
            Json(PermissionsResponse {
                auth_required: !session_has_required_scopes(&session),
            }),
        ),
        Ok(None) => {
            tracing::warn!(user_id = %viewer.user_id, "No session stored for user");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PermissionsResponse { auth_required: true }),
            )
        }
        Err(e) => {
            tracing::error!(user_id = %viewer.user_id, error = %e, "Failed to load session");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PermissionsResponse { auth_required: true }),
            )
        }
    };
    Ok(response.into_response())
}

/// Logout - expire both session cookies.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    (clear_session_cookies(jar, &state.config), StatusCode::NO_CONTENT)
}
