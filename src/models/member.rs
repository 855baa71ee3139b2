// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API views that join stored clubs and users with live Discord state.

use serde::Serialize;

use crate::models::{Club, User};

/// A club member: the local profile plus Discord identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubMember {
    /// Profile with `name` and `photo_url` already resolved against Discord
    #[serde(flatten)]
    pub user: User,
    pub discord_username: String,
}

impl ClubMember {
    pub fn display_name(&self) -> &str {
        self.user.name.as_deref().unwrap_or(&self.discord_username)
    }
}

/// A club with its resolved member list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubWithMembers {
    #[serde(flatten)]
    pub club: Club,
    pub members: Vec<ClubMember>,
    pub guild_id: String,
}

/// A club as shown in listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubSummary {
    #[serde(flatten)]
    pub club: Club,
    pub guild_id: String,
    pub member_count: usize,
}
