// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile routes.

use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Genres;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/profile/genres", get(get_genres))
}

/// The genre catalog shown during onboarding.
async fn get_genres(State(state): State<Arc<AppState>>) -> Result<Json<Genres>> {
    let genres = state
        .db
        .get_genres()
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Genre catalog is missing")))?;
    Ok(Json(genres))
}
