// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Referral attribution for visitors who arrive through a member's link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ids::new_object_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferralActionKind {
    Click,
    Login,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralAction {
    pub action: ReferralActionKind,
    pub at: DateTime<Utc>,
}

/// A referral, keyed by the temporary id handed to the visitor's browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub temp_uid: String,
    /// User who shared the link
    pub referrer_id: String,
    /// Account the visitor created, once they log in
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub actions: Vec<ReferralAction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    /// A referral for a fresh click on `referrer_id`'s link.
    pub fn from_click(referrer_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            temp_uid: new_object_id(),
            referrer_id: referrer_id.to_string(),
            user_id: None,
            actions: vec![ReferralAction {
                action: ReferralActionKind::Click,
                at: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Attribute the referral to the account created at first login.
    ///
    /// Returns false when the referral was already claimed.
    pub fn record_login(&mut self, user_id: &str, now: DateTime<Utc>) -> bool {
        if self.user_id.is_some() {
            return false;
        }
        self.user_id = Some(user_id.to_string());
        self.actions.push(ReferralAction {
            action: ReferralActionKind::Login,
            at: now,
        });
        self.updated_at = now;
        true
    }
}
