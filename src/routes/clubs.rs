// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club routes: directory, mutation, membership and shelf.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::extract::ValidatedJson;
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::{Club, ClubMember, ClubSummary, ClubWithMembers, ReadingSpeed, User};
use crate::services::clubs::{CreateClubRequest, CreatedClub, UpdateClubRequest};
use crate::services::membership::set_membership;
use crate::services::shelf::{update_shelf, ShelfUpdateRequest};
use crate::services::{ClubService, DirectoryService};
use crate::AppState;

/// Routes readable without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/clubs", get(list_clubs))
        .route("/clubs/{club_id}", get(get_club))
        .route("/clubs/user/{user_id}", get(get_user_clubs))
        .route("/clubs/clubsById", post(get_clubs_by_id))
}

/// Routes that need a signed-in user.
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/clubs", post(create_club))
        .route("/clubs/{club_id}", put(update_club).delete(delete_club))
        .route("/clubs/{club_id}/updatebook", put(update_book))
        .route("/clubs/{club_id}/membership", put(update_membership))
}

/// Load the signed-in user's profile; a session for a vanished user is
/// treated as no session.
async fn current_user(state: &AppState, auth: &AuthUser) -> Result<User> {
    state.db.get_user(&auth.user_id).await?.ok_or_else(|| {
        tracing::warn!(user_id = %auth.user_id, "Session refers to unknown user");
        AppError::Unauthorized
    })
}

// ─── Directory ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClubsParams {
    #[serde(default)]
    after: Option<String>,
    /// Parsed leniently; anything unparsable means the default size.
    #[serde(default)]
    page_size: Option<String>,
    #[serde(default)]
    reading_speed: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClubListResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<unknown>"))]
    pub clubs: Vec<ClubSummary>,
}

async fn list_clubs(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Query(params): Query<ListClubsParams>,
) -> Result<Json<ClubListResponse>> {
    let reading_speed = match params.reading_speed.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<ReadingSpeed>() {
            Ok(speed) => Some(speed),
            Err(()) => {
                // No stored club can carry an unknown speed.
                tracing::debug!(reading_speed = raw, "Unknown reading speed filter");
                return Ok(Json(ClubListResponse { clubs: Vec::new() }));
            }
        },
    };
    let page_size = params.page_size.and_then(|s| s.trim().parse().ok());
    let after = params.after.filter(|s| !s.is_empty());

    tracing::debug!(
        viewer = viewer.as_ref().map(|v| v.user_id.as_str()),
        after = after.as_deref(),
        "Listing clubs"
    );

    let clubs = DirectoryService::new(&state)
        .list_clubs(reading_speed, after, page_size)
        .await?;
    Ok(Json(ClubListResponse { clubs }))
}

async fn get_club(
    State(state): State<Arc<AppState>>,
    Path(club_id): Path<String>,
) -> Result<Json<ClubWithMembers>> {
    Ok(Json(DirectoryService::new(&state).get_club(&club_id).await?))
}

async fn get_user_clubs(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<ClubSummary>>> {
    let clubs = DirectoryService::new(&state)
        .get_user_clubs(&user_id, viewer.as_ref().map(|v| v.user_id.as_str()))
        .await?;
    Ok(Json(clubs))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClubsByIdRequest {
    #[validate(length(max = 100, message = "At most 100 clubs per request"))]
    pub club_ids: Vec<String>,
}

async fn get_clubs_by_id(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ClubsByIdRequest>,
) -> Result<Json<Vec<ClubWithMembers>>> {
    let clubs = DirectoryService::new(&state)
        .get_clubs_by_ids(&request.club_ids)
        .await?;
    Ok(Json(clubs))
}

// ─── Mutation ────────────────────────────────────────────────

async fn create_club(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    ValidatedJson(request): ValidatedJson<CreateClubRequest>,
) -> Result<(StatusCode, Json<CreatedClub>)> {
    let owner = current_user(&state, &auth).await?;
    let created = ClubService::new(&state).create_club(&owner, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_club(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(club_id): Path<String>,
    ValidatedJson(request): ValidatedJson<UpdateClubRequest>,
) -> Result<Json<Club>> {
    let club = ClubService::new(&state)
        .update_club(&auth.user_id, &club_id, request.new_club)
        .await?;
    Ok(Json(club))
}

async fn delete_club(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(club_id): Path<String>,
) -> Result<StatusCode> {
    let requester = current_user(&state, &auth).await?;
    ClubService::new(&state)
        .delete_club(&requester, &club_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Shelf & membership ──────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ShelfUpdateResponse {
    #[serde(rename = "resultWTR")]
    pub result_wtr: Club,
}

async fn update_book(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(club_id): Path<String>,
    ValidatedJson(request): ValidatedJson<ShelfUpdateRequest>,
) -> Result<Json<ShelfUpdateResponse>> {
    tracing::debug!(user_id = %auth.user_id, club_id = %club_id, "Updating club shelf");
    let club = update_shelf(&state.db, &club_id, request).await?;
    Ok(Json(ShelfUpdateResponse { result_wtr: club }))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MembershipRequest {
    /// `true` to join, `false` to leave
    pub is_member: bool,
}

async fn update_membership(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(club_id): Path<String>,
    ValidatedJson(request): ValidatedJson<MembershipRequest>,
) -> Result<Json<Vec<ClubMember>>> {
    let user = current_user(&state, &auth).await?;
    let members = set_membership(&state, &user, &club_id, request.is_member).await?;
    Ok(Json(members))
}
