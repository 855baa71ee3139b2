// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT session authentication and session cookies.

use crate::config::Config;
use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// HttpOnly cookie holding the session JWT.
pub const SESSION_COOKIE: &str = "caravan_session";
/// Script-readable cookie holding the signed-in user id.
pub const USER_ID_COOKIE: &str = "userId";

/// HttpOnly cookie carrying the referral a visitor arrived through.
pub const REFERRAL_COOKIE: &str = "referredTempUid";
/// Script-readable marker that the referral click was recorded.
pub const REFERRAL_CLICK_COOKIE: &str = "refClickComplete";

const SESSION_DAYS: i64 = 30;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (local user id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: String,
}

/// Find the session token in the cookie or `Authorization: Bearer` header.
fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Decode and verify a session JWT.
pub fn decode_session(token: &str, signing_key: &[u8]) -> Result<AuthUser, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|_| AppError::InvalidToken)?;
    if token_data.claims.sub.is_empty() {
        return Err(AppError::InvalidToken);
    }
    Ok(AuthUser {
        user_id: token_data.claims.sub,
    })
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(&jar, request.headers()).ok_or(AppError::Unauthorized)?;
    let auth_user = decode_session(&token, &state.config.jwt_signing_key)?;
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// The signed-in user when the request carries a valid session, else `None`.
///
/// For routes that behave differently for signed-in viewers but stay public.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<Arc<AppState>> for MaybeAuthUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let viewer = session_token(&jar, &parts.headers)
            .and_then(|token| decode_session(&token, &state.config.jwt_signing_key).ok());
        Ok(MaybeAuthUser(viewer))
    }
}

/// Create a JWT for a user session.
pub fn create_jwt(user_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + (SESSION_DAYS as usize) * 24 * 60 * 60,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Add both session cookies for a freshly signed-in user.
pub fn add_session_cookies(jar: CookieJar, config: &Config, user_id: &str, jwt: &str) -> CookieJar {
    let secure = config.secure_cookies();
    let max_age = time::Duration::days(SESSION_DAYS);

    jar.add(
        Cookie::build((SESSION_COOKIE, jwt.to_string()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(max_age),
    )
    .add(
        Cookie::build((USER_ID_COOKIE, user_id.to_string()))
            .path("/")
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(max_age),
    )
}

/// Expire both session cookies. Emitted even when the request had none.
pub fn clear_session_cookies(jar: CookieJar, config: &Config) -> CookieJar {
    let secure = config.secure_cookies();

    jar.add(
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO),
    )
    .add(
        Cookie::build((USER_ID_COOKIE, ""))
            .path("/")
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO),
    )
}

/// Remember a recorded referral click until the visitor signs up.
pub fn add_referral_cookies(jar: CookieJar, config: &Config, temp_uid: &str) -> CookieJar {
    let secure = config.secure_cookies();
    let max_age = time::Duration::days(SESSION_DAYS);

    jar.add(
        Cookie::build((REFERRAL_COOKIE, temp_uid.to_string()))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(max_age),
    )
    .add(
        Cookie::build((REFERRAL_CLICK_COOKIE, "true"))
            .path("/")
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(max_age),
    )
}

/// Expire both referral cookies once the referral has been attributed.
pub fn clear_referral_cookies(jar: CookieJar, config: &Config) -> CookieJar {
    let secure = config.secure_cookies();

    jar.add(
        Cookie::build((REFERRAL_COOKIE, ""))
            .path("/")
            .http_only(true)
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO),
    )
    .add(
        Cookie::build((REFERRAL_CLICK_COOKIE, ""))
            .path("/")
            .secure(secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO),
    )
}
