// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Referral link routes.

use axum::{extract::State, http::StatusCode, routing::post, Router};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::auth::add_referral_cookies;
use crate::middleware::MaybeAuthUser;
use crate::models::Referral;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/referral/click", post(record_click))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReferralClickRequest {
    #[validate(length(equal = 24, message = "Invalid referrer id"))]
    pub referrer_id: String,
}

/// Record a visit through a member's referral link and remember it in a
/// cookie until the visitor's first login.
async fn record_click(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    jar: CookieJar,
    ValidatedJson(request): ValidatedJson<ReferralClickRequest>,
) -> Result<(CookieJar, StatusCode)> {
    if viewer.is_some() {
        // Signed-in members already have an account to attribute.
        return Ok((jar, StatusCode::NO_CONTENT));
    }

    state
        .db
        .get_user(&request.referrer_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Unknown referrer".to_string()))?;

    let referral = Referral::from_click(&request.referrer_id, Utc::now());
    state.db.set_referral(&referral).await?;
    tracing::info!(
        temp_uid = %referral.temp_uid,
        referrer_id = %referral.referrer_id,
        "Referral click recorded"
    );

    Ok((
        add_referral_cookies(jar, &state.config, &referral.temp_uid),
        StatusCode::NO_CONTENT,
    ))
}
