// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Joining and leaving clubs.
//!
//! Membership lives entirely in Discord: a user is a member when they can
//! view the club channel. Joining writes an allow overwrite for the user,
//! leaving writes a deny overwrite. The overwrite entry is never removed.

use crate::error::AppError;
use crate::models::{Club, ClubMember, User};
use crate::services::directory::resolve_members;
use crate::services::guild::ChannelView;
use crate::services::permissions::Permissions;
use crate::AppState;

/// An overwrite to write for a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MembershipChange {
    pub allow: Permissions,
    pub deny: Permissions,
}

/// Decide the overwrite for `user` joining (`join = true`) or leaving.
///
/// Rejections carry the message shown to the user.
pub fn plan_membership_change(
    channel: &ChannelView<'_>,
    club: &Club,
    user: &User,
    join: bool,
    elevated_role: &str,
) -> Result<MembershipChange, AppError> {
    let is_owner = club.owner_id == user.id;
    let is_member = channel.member(&user.discord_id).is_some();

    if join {
        if is_member {
            return Err(AppError::PermissionDenied(
                "You're already a member of the club!".to_string(),
            ));
        }
        let size = channel
            .countable_members(&club.owner_discord_id, elevated_role)
            .len();
        if size >= club.max_members as usize {
            return Err(AppError::PermissionDenied(format!(
                "There are already {}/{} people in the club.",
                size, club.max_members
            )));
        }
        if channel
            .member_overwrite(&user.discord_id)
            .is_some_and(|o| o.allow.contains(Permissions::VIEW_CHANNEL))
        {
            return Err(AppError::PermissionDenied(
                "You already have access to the channel!".to_string(),
            ));
        }

        let (allow, deny) = if is_owner {
            (Permissions::MEMBER | Permissions::MANAGE_MESSAGES, Permissions::NONE)
        } else {
            (Permissions::MEMBER, Permissions::MANAGE_MESSAGES)
        };
        Ok(MembershipChange { allow, deny })
    } else {
        if is_owner {
            return Err(AppError::PermissionDenied(
                "An owner cannot leave a club.".to_string(),
            ));
        }
        if !is_member {
            return Err(AppError::PermissionDenied(
                "You're not a member of the club already!".to_string(),
            ));
        }
        Ok(MembershipChange {
            allow: Permissions::NONE,
            deny: Permissions::MEMBER | Permissions::MANAGE_MESSAGES,
        })
    }
}

/// Join or leave a club and return the updated member list.
pub async fn set_membership(
    state: &AppState,
    user: &User,
    club_id: &str,
    join: bool,
) -> Result<Vec<ClubMember>, AppError> {
    let club = state
        .db
        .get_club(club_id)
        .await?
        .filter(|c| !c.is_pending_deletion())
        .ok_or_else(|| AppError::NotFound(format!("Could not find club {}", club_id)))?;

    let elevated_role = state.config.discord_elevated_role.as_str();
    let snapshot = state.discord.guild_snapshot().await?;
    let channel = snapshot.channel(&club.channel_id).ok_or_else(|| {
        AppError::BadRequest(format!("Channel was deleted, clubId: {}", club_id))
    })?;

    let change = plan_membership_change(&channel, &club, user, join, elevated_role)?;
    state
        .discord
        .edit_member_overwrite(&club.channel_id, &user.discord_id, change.allow, change.deny)
        .await?;

    tracing::info!(
        user_id = %user.id,
        club_id,
        join,
        "Club membership changed"
    );

    // Re-read so the response reflects the overwrite just written.
    let snapshot = state.discord.guild_snapshot().await?;
    let channel = snapshot.channel(&club.channel_id).ok_or_else(|| {
        AppError::BadRequest(format!("Channel was deleted, clubId: {}", club_id))
    })?;
    resolve_members(&state.db, &channel, &club, elevated_role).await
}
