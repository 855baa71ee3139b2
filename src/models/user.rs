//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ShelfEntry;

/// User profile stored in Firestore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Object id (also used as document ID)
    pub id: String,
    /// Discord user ID
    pub discord_id: String,
    /// Unique URL slug derived from the Discord username
    pub url_slug: String,
    /// Display name (falls back to the Discord username when empty)
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Profile picture URL
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub selected_genres: Vec<String>,
    #[serde(default)]
    pub questions: Vec<serde_json::Value>,
    #[serde(default)]
    pub shelf: UserShelf,
    /// Last onboarding step completed
    #[serde(default)]
    pub onboarding_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's personal shelf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserShelf {
    #[serde(default)]
    pub not_started: Vec<ShelfEntry>,
    #[serde(default)]
    pub read: Vec<ShelfEntry>,
}

/// Per-user notification preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_settings: EmailSettings,
}

/// Which emails a user has opted into. Everything is on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    pub updates: bool,
    pub recs_and_inspiration: bool,
    pub reminders: bool,
    pub club_invites: bool,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            updates: true,
            recs_and_inspiration: true,
            reminders: true,
            club_invites: true,
        }
    }
}
