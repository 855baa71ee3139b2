// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth session model (encrypted tokens in Firestore).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth provider a session was issued by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthClient {
    Discord,
}

impl OAuthClient {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discord => "discord",
        }
    }
}

/// A user's OAuth session, one per (user, client).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub client: OAuthClient,
    /// Encrypted access token (base64)
    pub access_token_encrypted: String,
    /// Encrypted refresh token (base64)
    pub refresh_token_encrypted: String,
    pub access_token_expires_at: DateTime<Utc>,
    /// Space separated OAuth scopes
    pub scope: String,
    pub token_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Firestore document id for a user's session with `client`.
    pub fn document_id(user_id: &str, client: OAuthClient) -> String {
        format!("{}_{}", user_id, client.as_str())
    }

    /// Whether every scope in `required` was granted.
    pub fn has_scopes(&self, required: &[&str]) -> bool {
        required
            .iter()
            .all(|needed| self.scope.split_whitespace().any(|s| s == *needed))
    }
}
