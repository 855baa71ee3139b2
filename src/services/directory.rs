// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club directory: listing, lookup and member resolution.
//!
//! Every operation reads the stored clubs first, then joins them with a
//! single guild snapshot. Clubs whose channel no longer exists, and clubs
//! pending deletion, are never returned.

use std::collections::HashMap;

use crate::db::{ClubQuery, FirestoreDb};
use crate::error::AppError;
use crate::models::{Club, ClubMember, ClubSummary, ClubWithMembers, ReadingSpeed};
use crate::services::discord::{DiscordClient, GuildMember};
use crate::services::guild::{ChannelView, GuildSnapshot};
use crate::AppState;

pub const MIN_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Clamp a requested page size into the supported range.
pub fn page_size(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(0)
        .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// Read-only club queries.
pub struct DirectoryService<'a> {
    db: &'a FirestoreDb,
    discord: &'a DiscordClient,
    elevated_role: &'a str,
}

impl<'a> DirectoryService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            db: &state.db,
            discord: &state.discord,
            elevated_role: &state.config.discord_elevated_role,
        }
    }

    /// One page of listed clubs, newest first.
    pub async fn list_clubs(
        &self,
        reading_speed: Option<ReadingSpeed>,
        after: Option<String>,
        requested_size: Option<u32>,
    ) -> Result<Vec<ClubSummary>, AppError> {
        let query = ClubQuery {
            reading_speed,
            after,
            limit: page_size(requested_size),
        };
        let clubs = self.db.list_clubs(&query).await?;
        if clubs.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.discord.guild_snapshot().await?;
        Ok(clubs
            .into_iter()
            .filter_map(|club| summarize(&snapshot, club, self.elevated_role))
            .collect())
    }

    /// A single club with its members.
    pub async fn get_club(&self, club_id: &str) -> Result<ClubWithMembers, AppError> {
        let club = self
            .db
            .get_club(club_id)
            .await?
            .filter(|c| !c.is_pending_deletion())
            .ok_or_else(|| AppError::NotFound(format!("Club {} not found", club_id)))?;

        let snapshot = self.discord.guild_snapshot().await?;
        let channel = snapshot.channel(&club.channel_id).ok_or_else(|| {
            tracing::warn!(club_id, channel_id = %club.channel_id, "Club channel is gone");
            AppError::NotFound(format!("Channel for club {} not found", club_id))
        })?;

        let members = resolve_members(self.db, &channel, &club, self.elevated_role).await?;
        Ok(ClubWithMembers {
            club,
            members,
            guild_id: snapshot.guild_id().to_string(),
        })
    }

    /// Clubs the user belongs to.
    ///
    /// Unlisted clubs are only included when `viewer_id` is also a member.
    pub async fn get_user_clubs(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Vec<ClubSummary>, AppError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let viewer_discord_id = match viewer_id {
            Some(id) if id == user.id => Some(user.discord_id.clone()),
            Some(id) => self.db.get_user(id).await?.map(|v| v.discord_id),
            None => None,
        };

        let snapshot = self.discord.guild_snapshot().await?;
        let channel_ids = snapshot.channels_visible_to(&user.discord_id);
        if channel_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut clubs = self.db.get_clubs_by_channel_ids(&channel_ids).await?;
        clubs.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(clubs
            .into_iter()
            .filter(|club| {
                if !club.unlisted {
                    return true;
                }
                let (Some(viewer), Some(channel)) =
                    (viewer_discord_id.as_deref(), snapshot.channel(&club.channel_id))
                else {
                    return false;
                };
                channel.member(viewer).is_some()
            })
            .filter_map(|club| summarize(&snapshot, club, self.elevated_role))
            .collect())
    }

    /// Several clubs by id, each with its members.
    pub async fn get_clubs_by_ids(&self, ids: &[String]) -> Result<Vec<ClubWithMembers>, AppError> {
        let clubs = self.db.get_clubs_by_ids(ids).await?;
        if clubs.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.discord.guild_snapshot().await?;
        let mut result = Vec::with_capacity(clubs.len());
        for club in clubs.into_iter().filter(|c| !c.is_pending_deletion()) {
            let Some(channel) = snapshot.channel(&club.channel_id) else {
                tracing::warn!(club_id = %club.id, "Skipping club whose channel is gone");
                continue;
            };
            let members = resolve_members(self.db, &channel, &club, self.elevated_role).await?;
            result.push(ClubWithMembers {
                club,
                members,
                guild_id: snapshot.guild_id().to_string(),
            });
        }

        // Keep the caller's order.
        let position: HashMap<&str, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        result.sort_by_key(|c| position.get(c.club.id.as_str()).copied().unwrap_or(usize::MAX));
        Ok(result)
    }
}

/// Listing view of a club, or `None` when it should be hidden.
pub fn summarize(snapshot: &GuildSnapshot, club: Club, elevated_role: &str) -> Option<ClubSummary> {
    if club.is_pending_deletion() {
        return None;
    }
    let channel = snapshot.channel(&club.channel_id)?;
    let member_count = channel
        .countable_members(&club.owner_discord_id, elevated_role)
        .len();
    Some(ClubSummary {
        club,
        guild_id: snapshot.guild_id().to_string(),
        member_count,
    })
}

/// Countable channel members joined with their local profiles, sorted by name.
///
/// Discord members without a local account are dropped.
pub async fn resolve_members(
    db: &FirestoreDb,
    channel: &ChannelView<'_>,
    club: &Club,
    elevated_role: &str,
) -> Result<Vec<ClubMember>, AppError> {
    let guild_members = channel.countable_members(&club.owner_discord_id, elevated_role);
    if guild_members.is_empty() {
        return Ok(Vec::new());
    }

    let discord_ids: Vec<String> = guild_members.iter().map(|m| m.user.id.clone()).collect();
    let users = db.get_users_by_discord_ids(&discord_ids).await?;

    Ok(join_members(&guild_members, users, &club.id))
}

/// Pair each guild member with the user sharing its Discord id.
pub fn join_members(
    guild_members: &[&GuildMember],
    users: Vec<crate::models::User>,
    club_id: &str,
) -> Vec<ClubMember> {
    let mut by_discord_id: HashMap<String, crate::models::User> = users
        .into_iter()
        .filter(|u| !u.is_bot)
        .map(|u| (u.discord_id.clone(), u))
        .collect();

    let mut members: Vec<ClubMember> = guild_members
        .iter()
        .filter_map(|gm| {
            let Some(mut user) = by_discord_id.remove(&gm.user.id) else {
                tracing::warn!(
                    club_id,
                    discord_id = %gm.user.id,
                    "Channel member has no local account"
                );
                return None;
            };
            if user.name.as_deref().map_or(true, str::is_empty) {
                user.name = Some(gm.user.username.clone());
            }
            if user.photo_url.is_none() {
                user.photo_url = gm.user.avatar_url();
            }
            Some(ClubMember {
                user,
                discord_username: gm.user.username.clone(),
            })
        })
        .collect();

    members.sort_by(|a, b| a.display_name().cmp(b.display_name()));
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChannelSource, User, UserShelf};
    use crate::services::guild::tests::{member, snapshot};
    use chrono::Utc;

    fn user(id: &str, discord_id: &str, name: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: id.to_string(),
            discord_id: discord_id.to_string(),
            url_slug: format!("slug-{discord_id}"),
            name: name.map(str::to_string),
            bio: None,
            photo_url: None,
            is_bot: false,
            selected_genres: vec![],
            questions: vec![],
            shelf: UserShelf::default(),
            onboarding_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn club(channel_id: &str) -> Club {
        let now = Utc::now();
        Club {
            id: "5d8a1c2b3e4f5a6b7c8d9e0f".to_string(),
            name: "Slow Burners".to_string(),
            bio: String::new(),
            max_members: 5,
            owner_id: "owner".to_string(),
            owner_discord_id: "500".to_string(),
            unlisted: false,
            vibe: None,
            reading_speed: None,
            channel_source: ChannelSource::Discord,
            channel_id: channel_id.to_string(),
            shelf: vec![],
            version: 0,
            pending_deletion_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_page_size_clamped() {
        assert_eq!(page_size(None), 10);
        assert_eq!(page_size(Some(3)), 10);
        assert_eq!(page_size(Some(25)), 25);
        assert_eq!(page_size(Some(500)), 50);
    }

    #[test]
    fn test_summarize_counts_countable_members() {
        let snap = snapshot();
        let summary = summarize(&snap, club("77"), "Admin").unwrap();
        assert_eq!(summary.member_count, 2);
        assert_eq!(summary.guild_id, snap.guild_id());
    }

    #[test]
    fn test_summarize_hides_missing_channel_and_pending_deletion() {
        let snap = snapshot();
        assert!(summarize(&snap, club("404"), "Admin").is_none());

        let mut pending = club("77");
        pending.pending_deletion_at = Some(Utc::now());
        assert!(summarize(&snap, pending, "Admin").is_none());
    }

    #[test]
    fn test_join_members_drops_unknown_and_sorts() {
        let a = member("1", &[], false);
        let b = member("2", &[], false);
        let c = member("3", &[], false);
        let users = vec![user("u2", "2", Some("Alice")), user("u1", "1", None)];

        let joined = join_members(&[&a, &b, &c], users, "club");
        let names: Vec<&str> = joined.iter().map(|m| m.display_name()).collect();
        // "3" has no account; "1" falls back to the Discord username.
        assert_eq!(names, vec!["Alice", "user1"]);
        assert_eq!(joined[1].discord_username, "user1");
    }

    #[test]
    fn test_member_serializes_flat() {
        let gm = member("9", &[], false);
        let joined = join_members(&[&gm], vec![user("u9", "9", Some("Reader"))], "club");
        let json = serde_json::to_value(&joined[0]).unwrap();
        assert_eq!(json["discordId"], "9");
        assert_eq!(json["discordUsername"], "user9");
        assert_eq!(json["name"], "Reader");
    }
}
