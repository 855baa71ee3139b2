// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club mutation: create, update and delete.
//!
//! Creation provisions the Discord channel first and compensates by
//! deleting it when the document cannot be stored. Deletion is two-phase:
//! the document is flagged, the channel removed, then the document removed.
//! A flagged club whose deletion was interrupted is finished by
//! [`sweep_pending_deletions`].

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::ids::new_object_id;
use crate::models::{
    BookInput, ChannelSource, Club, GroupVibe, ReadingSpeed, ReadingState, ShelfEntry, User,
};
use crate::services::discord::{CreateChannel, DiscordClient, CHANNEL_TYPE_TEXT};
use crate::services::permissions::{PermissionOverwrite, Permissions};
use crate::time_utils::has_elapsed;
use crate::AppState;

/// Cover image prefixes that are known to redirect to HTTPS.
const KNOWN_HTTPS_REDIRECTS: &[&str] = &["http://books.google.com/books/"];

/// Flagged clubs younger than this are left to the request that flagged them.
const SWEEP_GRACE_SECS: i64 = 60;

/// A club may never be shrunk below its current countable membership.
pub fn check_capacity(max_members: u32, member_count: usize) -> Result<(), AppError> {
    if (max_members as usize) < member_count {
        return Err(AppError::Unprocessable(format!(
            "You cannot set max members ({}) to be smaller than the current number of members ({}).",
            max_members, member_count
        )));
    }
    Ok(())
}

/// Body of `POST /clubs`.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClubRequest {
    #[validate(length(min = 2, max = 150, message = "Name must be between 2 and 150 chars"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 300, message = "Bio must be less than 300 chars"))]
    pub bio: String,
    #[validate(range(min = 2, max = 999, message = "Max members must be between 2 and 999"))]
    pub max_members: u32,
    #[serde(default)]
    pub reading_speed: Option<ReadingSpeed>,
    #[serde(default)]
    pub vibe: Option<GroupVibe>,
    #[serde(default)]
    pub unlisted: bool,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub channel_source: ChannelSource,
    /// Discord ids to grant access at creation
    #[serde(default)]
    pub invited_users: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub shelf: Vec<BookInput>,
}

/// Result of a successful creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedClub {
    pub club: Club,
    /// The channel as requested from Discord
    pub discord: CreateChannel,
}

/// Body of `PUT /clubs/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClubRequest {
    pub new_club: ClubPatch,
}

/// Editable club metadata. Other fields sent by the client are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubPatch {
    pub bio: String,
    pub max_members: i64,
    pub name: String,
    #[serde(default)]
    pub reading_speed: Option<String>,
    pub unlisted: bool,
    #[serde(default)]
    pub vibe: Option<String>,
}

fn field_error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

impl Validate for UpdateClubRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let patch = &self.new_club;
        let mut errors = ValidationErrors::new();

        if patch.bio.chars().count() > 300 {
            errors.add(
                "newClub.bio",
                field_error("length", "Bio must be a string less than 300 chars in length.".into()),
            );
        }
        if !(2..=999).contains(&patch.max_members) {
            errors.add(
                "newClub.maxMembers",
                field_error(
                    "range",
                    "Max members must be an integer between 1 and 1000 exclusive".into(),
                ),
            );
        }
        if !(2..=150).contains(&patch.name.chars().count()) {
            errors.add(
                "newClub.name",
                field_error(
                    "length",
                    "Name must be a string between 2 and 150 chars in length".into(),
                ),
            );
        }
        if patch
            .reading_speed
            .as_deref()
            .and_then(|s| s.parse::<ReadingSpeed>().ok())
            .is_none()
        {
            let allowed: Vec<&str> = ReadingSpeed::ALL.iter().map(|s| s.as_str()).collect();
            errors.add(
                "newClub.readingSpeed",
                field_error(
                    "enum",
                    format!("Reading speed must be one of {}", allowed.join(", ")),
                ),
            );
        }
        if patch
            .vibe
            .as_deref()
            .and_then(|s| s.parse::<GroupVibe>().ok())
            .is_none()
        {
            let allowed: Vec<&str> = GroupVibe::ALL.iter().map(|v| v.as_str()).collect();
            errors.add(
                "newClub.vibe",
                field_error("enum", format!("Vibe must be one of {}", allowed.join(", "))),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Channel overwrites for a new club.
///
/// The owner appears exactly once and also gets message and channel
/// management; `@everyone` loses view access.
pub fn creation_overwrites(
    guild_id: &str,
    owner_discord_id: &str,
    invited: &[String],
) -> Vec<PermissionOverwrite> {
    let mut invitees: Vec<&str> = Vec::with_capacity(invited.len() + 1);
    for id in invited.iter().map(String::as_str) {
        if id != owner_discord_id && !id.is_empty() && !invitees.contains(&id) {
            invitees.push(id);
        }
    }

    let mut overwrites: Vec<PermissionOverwrite> = invitees
        .into_iter()
        .map(|id| PermissionOverwrite::member(id, Permissions::MEMBER, Permissions::NONE))
        .collect();
    overwrites.push(PermissionOverwrite::member(
        owner_discord_id,
        Permissions::MEMBER | Permissions::MANAGE_MESSAGES | Permissions::MANAGE_CHANNELS,
        Permissions::NONE,
    ));
    overwrites.push(PermissionOverwrite::role(
        guild_id,
        Permissions::NONE,
        Permissions::VIEW_CHANNEL,
    ));
    overwrites
}

/// Upgrade cover URLs on hosts known to redirect to HTTPS.
pub fn secure_cover_url(url: String) -> String {
    if KNOWN_HTTPS_REDIRECTS.iter().any(|p| url.starts_with(p)) {
        url.replacen("http:", "https:", 1)
    } else {
        url
    }
}

/// Materialize the initial shelf of a new club.
pub fn initial_shelf(books: Vec<BookInput>) -> Result<Vec<ShelfEntry>, AppError> {
    let now = Utc::now();
    let shelf: Vec<ShelfEntry> = books
        .into_iter()
        .map(|mut book| {
            book.cover_image_url = book.cover_image_url.map(secure_cover_url);
            let state = book.reading_state.unwrap_or(ReadingState::NotStarted);
            book.into_entry(state, now)
        })
        .collect();

    let current = shelf
        .iter()
        .filter(|e| e.reading_state == ReadingState::Current)
        .count();
    if current > 1 {
        return Err(AppError::Unprocessable(
            "A club can only read one book at a time".to_string(),
        ));
    }
    Ok(shelf)
}

/// Club create, update and delete.
pub struct ClubService<'a> {
    db: &'a FirestoreDb,
    discord: &'a DiscordClient,
    elevated_role: &'a str,
}

impl<'a> ClubService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            db: &state.db,
            discord: &state.discord,
            elevated_role: &state.config.discord_elevated_role,
        }
    }

    /// Provision a channel and store a new club owned by `owner`.
    pub async fn create_club(
        &self,
        owner: &User,
        request: CreateClubRequest,
    ) -> Result<CreatedClub, AppError> {
        let shelf = initial_shelf(request.shelf)?;

        let channel_request = CreateChannel {
            name: request.name.clone(),
            kind: CHANNEL_TYPE_TEXT,
            nsfw: request.nsfw,
            permission_overwrites: creation_overwrites(
                self.discord.guild_id(),
                &owner.discord_id,
                &request.invited_users,
            ),
        };
        let channel = self.discord.create_text_channel(&channel_request).await?;

        let now = Utc::now();
        let club = Club {
            id: new_object_id(),
            name: request.name,
            bio: request.bio,
            max_members: request.max_members,
            owner_id: owner.id.clone(),
            owner_discord_id: owner.discord_id.clone(),
            unlisted: request.unlisted,
            vibe: request.vibe,
            reading_speed: request.reading_speed,
            channel_source: request.channel_source,
            channel_id: channel.id.clone(),
            shelf,
            version: 0,
            pending_deletion_at: None,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.db.create_club(&club).await {
            tracing::error!(
                error = %e,
                channel_id = %channel.id,
                "Failed to store club, deleting its channel"
            );
            if let Err(cleanup) = self.discord.delete_channel(&channel.id).await {
                tracing::error!(
                    error = %cleanup,
                    channel_id = %channel.id,
                    "Failed to delete orphaned channel"
                );
            }
            return Err(e);
        }

        tracing::info!(
            club_id = %club.id,
            channel_id = %club.channel_id,
            owner_id = %owner.id,
            "Club created"
        );

        Ok(CreatedClub {
            club,
            discord: channel_request,
        })
    }

    /// Apply an owner's metadata edit.
    pub async fn update_club(
        &self,
        requester_id: &str,
        club_id: &str,
        patch: ClubPatch,
    ) -> Result<Club, AppError> {
        let existing = self
            .db
            .get_club(club_id)
            .await?
            .filter(|c| !c.is_pending_deletion())
            .ok_or_else(|| AppError::NotFound(format!("Unable to find club {}", club_id)))?;

        if existing.owner_id != requester_id {
            tracing::warn!(
                user_id = requester_id,
                club_id,
                "Non-owner attempted to edit club"
            );
            return Err(AppError::PermissionDenied(
                "Only the club owner may update a club!".to_string(),
            ));
        }

        let max_members = u32::try_from(patch.max_members)
            .map_err(|_| AppError::Unprocessable("Invalid max members".to_string()))?;

        let snapshot = self.discord.guild_snapshot().await?;
        let member_count = snapshot
            .channel(&existing.channel_id)
            .map(|c| {
                c.countable_members(&existing.owner_discord_id, self.elevated_role)
                    .len()
            })
            .unwrap_or(0);
        check_capacity(max_members, member_count)?;

        let reading_speed = patch.reading_speed.as_deref().and_then(|s| s.parse().ok());
        let vibe = patch.vibe.as_deref().and_then(|s| s.parse().ok());
        let ClubPatch {
            bio, name, unlisted, ..
        } = patch;
        let expected_owner = existing.owner_id.clone();

        self.db
            .update_club_with(club_id, move |club| {
                if club.owner_id != expected_owner || club.is_pending_deletion() {
                    return Err(AppError::Conflict(
                        "Club changed while updating".to_string(),
                    ));
                }
                club.bio = bio;
                club.max_members = max_members;
                club.name = name;
                club.reading_speed = reading_speed;
                club.unlisted = unlisted;
                club.vibe = vibe;
                Ok(())
            })
            .await
    }

    /// Delete a club and its channel.
    ///
    /// The requester must be able to see the channel and hold
    /// `MANAGE_CHANNELS` in it.
    pub async fn delete_club(&self, requester: &User, club_id: &str) -> Result<(), AppError> {
        let club = self
            .db
            .get_club(club_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Could not find club {}", club_id)))?;

        let snapshot = self.discord.guild_snapshot().await?;
        let Some(channel) = snapshot.channel(&club.channel_id) else {
            // Without a channel only the stored owner may retire the club;
            // the sweeper removes the orphaned document.
            if club.owner_id == requester.id {
                self.db.mark_club_pending_deletion(club_id, Utc::now()).await?;
                tracing::info!(club_id, "Orphaned club queued for deletion");
            } else {
                tracing::warn!(
                    user_id = %requester.id,
                    club_id,
                    "Non-owner tried to delete a club without a channel"
                );
            }
            return Err(AppError::BadRequest(format!(
                "Channel was deleted, clubId: {}",
                club_id
            )));
        };

        let allowed = channel
            .member(&requester.discord_id)
            .map(|m| channel.permissions_for(m).contains(Permissions::MANAGE_CHANNELS))
            .unwrap_or(false);
        if !allowed {
            tracing::warn!(
                user_id = %requester.id,
                club_id,
                "User lacks permission to delete club"
            );
            return Err(AppError::PermissionDenied(
                "You don't have permission to delete this channel.".to_string(),
            ));
        }

        self.db.mark_club_pending_deletion(club_id, Utc::now()).await?;
        finish_deletion(self.db, self.discord, &club).await?;

        tracing::info!(
            club_id,
            channel_id = %club.channel_id,
            user_id = %requester.id,
            "Club deleted"
        );
        Ok(())
    }
}

/// Second phase of a deletion: remove the channel, then the document.
async fn finish_deletion(
    db: &FirestoreDb,
    discord: &DiscordClient,
    club: &Club,
) -> Result<(), AppError> {
    match discord.delete_channel(&club.channel_id).await {
        Ok(()) => {}
        Err(e) if e.is_discord_not_found() => {
            tracing::debug!(channel_id = %club.channel_id, "Channel already gone");
        }
        Err(e) => return Err(e),
    }
    db.delete_club(&club.id).await
}

/// Finish every interrupted deletion. Returns how many clubs were removed.
pub async fn sweep_pending_deletions(
    db: &FirestoreDb,
    discord: &DiscordClient,
) -> Result<usize, AppError> {
    let now = Utc::now();
    let grace = Duration::seconds(SWEEP_GRACE_SECS);
    let mut removed = 0;

    for club in db.list_pending_deletions().await? {
        let Some(since) = club.pending_deletion_at else {
            continue;
        };
        if !has_elapsed(since, now, grace) {
            continue;
        }
        match finish_deletion(db, discord, &club).await {
            Ok(()) => {
                removed += 1;
                tracing::info!(club_id = %club.id, "Completed interrupted club deletion");
            }
            Err(e) => {
                tracing::warn!(club_id = %club.id, error = %e, "Deletion sweep failed for club");
            }
        }
    }

    Ok(removed)
}

/// Run the deletion sweeper forever at the configured interval.
pub async fn run_deletion_sweeper(state: std::sync::Arc<AppState>) {
    let period = std::time::Duration::from_secs(state.config.deletion_sweep_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        match sweep_pending_deletions(&state.db, &state.discord).await {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Deletion sweep finished"),
            Err(e) => tracing::warn!(error = %e, "Deletion sweep failed"),
        }
    }
}
