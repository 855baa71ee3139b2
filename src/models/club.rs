// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Club model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::ShelfEntry;

/// How fast a club intends to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ReadingSpeed {
    Slow,
    Moderate,
    Fast,
}

impl ReadingSpeed {
    pub const ALL: [ReadingSpeed; 3] = [Self::Slow, Self::Moderate, Self::Fast];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Moderate => "moderate",
            Self::Fast => "fast",
        }
    }
}

impl FromStr for ReadingSpeed {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

impl fmt::Display for ReadingSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The social tone a club advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "kebab-case")]
pub enum GroupVibe {
    Chill,
    FirstTimers,
    Learning,
    Nerdy,
    Power,
}

impl GroupVibe {
    pub const ALL: [GroupVibe; 5] = [
        Self::Chill,
        Self::FirstTimers,
        Self::Learning,
        Self::Nerdy,
        Self::Power,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chill => "chill",
            Self::FirstTimers => "first-timers",
            Self::Learning => "learning",
            Self::Nerdy => "nerdy",
            Self::Power => "power",
        }
    }
}

impl FromStr for GroupVibe {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or(())
    }
}

/// Chat platform hosting the club's channel. Only Discord exists today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ChannelSource {
    #[default]
    Discord,
}

/// Club document stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    /// Object id (also used as document ID)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    pub max_members: u32,
    /// Local user id of the owner
    pub owner_id: String,
    /// Discord user id of the owner
    pub owner_discord_id: String,
    #[serde(default)]
    pub unlisted: bool,
    #[serde(default)]
    pub vibe: Option<GroupVibe>,
    #[serde(default)]
    pub reading_speed: Option<ReadingSpeed>,
    #[serde(default)]
    pub channel_source: ChannelSource,
    pub channel_id: String,
    #[serde(default)]
    pub shelf: Vec<ShelfEntry>,
    /// Bumped on every conditional write
    #[serde(default)]
    pub version: u64,
    /// Set while a deletion is in flight; such clubs are invisible
    #[serde(default)]
    pub pending_deletion_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Club {
    pub fn is_pending_deletion(&self) -> bool {
        self.pending_deletion_at.is_some()
    }

    /// Number of shelf entries currently being read.
    pub fn current_book_count(&self) -> usize {
        self.shelf
            .iter()
            .filter(|e| e.reading_state == crate::models::ReadingState::Current)
            .count()
    }
}
