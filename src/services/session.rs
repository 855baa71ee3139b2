// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discord login: user resolution, session persistence and guild join.
//!
//! Handles:
//! - Exchanging the OAuth code and reading the Discord profile
//! - Finding the local user or creating one with a unique URL slug
//! - Back-filling the email address into user settings
//! - Storing the freshly granted tokens, encrypted
//! - Attributing a referral to a newly created user
//! - Adding the user to the club guild

use chrono::Utc;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::ids::new_object_id;
use crate::models::{EmailSettings, OAuthClient, Session, User, UserSettings, UserShelf};
use crate::services::crypto::TokenCipher;
use crate::services::discord::{DiscordClient, DiscordUser, TokenResponse, OAUTH_SCOPES};
use crate::time_utils::expiry_from_now;
use crate::AppState;

const MAX_SLUG_LEN: usize = 40;
const NUMBERED_SLUG_CANDIDATES: u32 = 5;

/// Lowercase, hyphen-separated form of a Discord username.
pub fn slugify(username: &str) -> String {
    let mut slug = String::with_capacity(username.len());
    for c in username.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug: String = slug.trim_end_matches('-').chars().take(MAX_SLUG_LEN).collect();
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "reader".to_string()
    } else {
        slug
    }
}

/// Slugs to try, in order, for a new user.
pub fn slug_candidates(username: &str) -> Vec<String> {
    let base = slugify(username);
    let mut candidates = vec![base.clone()];
    candidates.extend((2..2 + NUMBERED_SLUG_CANDIDATES).map(|n| format!("{}-{}", base, n)));
    // Last resort: a suffix from a fresh id is effectively unique.
    let id = new_object_id();
    candidates.push(format!("{}-{}", base, &id[id.len() - 6..]));
    candidates
}

/// Associated data binding an encrypted token to its session.
fn token_context(user_id: &str, kind: &str) -> String {
    format!("{}:{}", Session::document_id(user_id, OAuthClient::Discord), kind)
}

/// Whether a stored session holds every scope the app needs.
pub fn session_has_required_scopes(session: &Session) -> bool {
    session.has_scopes(OAUTH_SCOPES)
}

/// The session to store after a code exchange: the fresh grant replaces
/// any stored tokens, keeping the original creation time.
pub fn renew_session(existing: Option<&Session>, mut fresh: Session) -> Session {
    if let Some(existing) = existing {
        fresh.created_at = existing.created_at;
    }
    fresh
}

/// Result of a completed login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// The account was created by this login
    pub new_user: bool,
}

/// Runs the login flow for one OAuth callback.
pub struct LoginService<'a> {
    db: &'a FirestoreDb,
    discord: &'a DiscordClient,
    cipher: &'a TokenCipher,
}

impl<'a> LoginService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self {
            db: &state.db,
            discord: &state.discord,
            cipher: &state.cipher,
        }
    }

    /// Complete a login. `referral` is the temp uid from the visitor's
    /// referral cookie, attributed only when the account is new.
    pub async fn complete_login(
        &self,
        code: &str,
        redirect_uri: &str,
        referral: Option<&str>,
    ) -> Result<LoginOutcome, AppError> {
        let tokens = self.discord.exchange_code(code, redirect_uri).await?;
        let profile = self.discord.get_current_user(&tokens.access_token).await?;

        let (user, new_user) = self.resolve_user(&profile).await?;
        if new_user {
            if let Some(temp_uid) = referral {
                self.attribute_referral(temp_uid, &user).await;
            }
        }
        self.store_session(&user, &tokens).await?;

        self.discord
            .add_guild_member(&profile.id, &tokens.access_token)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Couldn't add user to guild");
                AppError::Discord("Could not authenticate".to_string())
            })?;

        tracing::info!(
            user_id = %user.id,
            discord_id = %user.discord_id,
            "Successful authentication"
        );
        Ok(LoginOutcome { user, new_user })
    }

    /// Find the user for a Discord profile, creating one on first login.
    async fn resolve_user(&self, profile: &DiscordUser) -> Result<(User, bool), AppError> {
        if let Some(user) = self.db.get_user_by_discord_id(&profile.id).await? {
            self.backfill_email(&user, profile).await?;
            return Ok((user, false));
        }

        let now = Utc::now();
        for slug in slug_candidates(&profile.username) {
            if self.db.is_slug_taken(&slug).await? {
                continue;
            }
            let user = User {
                id: new_object_id(),
                discord_id: profile.id.clone(),
                url_slug: slug,
                name: None,
                bio: None,
                photo_url: None,
                is_bot: profile.bot,
                selected_genres: Vec::new(),
                questions: Vec::new(),
                shelf: UserShelf::default(),
                onboarding_version: 0,
                created_at: now,
                updated_at: now,
            };
            self.db.upsert_user(&user).await?;
            self.db
                .set_user_settings(&UserSettings {
                    user_id: user.id.clone(),
                    email: profile.email.clone(),
                    email_settings: EmailSettings::default(),
                })
                .await?;

            tracing::info!(
                user_id = %user.id,
                discord_id = %user.discord_id,
                slug = %user.url_slug,
                "Created new user"
            );
            return Ok((user, true));
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "User creation failed: no free slug for Discord user {}",
            profile.id
        )))
    }

    async fn backfill_email(&self, user: &User, profile: &DiscordUser) -> Result<(), AppError> {
        let Some(email) = profile.email.clone() else {
            return Ok(());
        };
        match self.db.get_user_settings(&user.id).await? {
            Some(settings) if settings.email.is_some() => Ok(()),
            Some(mut settings) => {
                settings.email = Some(email);
                self.db.set_user_settings(&settings).await
            }
            None => {
                self.db
                    .set_user_settings(&UserSettings {
                        user_id: user.id.clone(),
                        email: Some(email),
                        email_settings: EmailSettings::default(),
                    })
                    .await
            }
        }
    }

    /// Record that a referred visitor signed up. Failures never block login.
    async fn attribute_referral(&self, temp_uid: &str, user: &User) {
        let result = async {
            let Some(mut referral) = self.db.get_referral(temp_uid).await? else {
                tracing::warn!(temp_uid, user_id = %user.id, "Unknown referral");
                return Ok(());
            };
            if referral.record_login(&user.id, Utc::now()) {
                self.db.set_referral(&referral).await?;
                tracing::info!(
                    temp_uid,
                    user_id = %user.id,
                    referrer_id = %referral.referrer_id,
                    "Referral attributed"
                );
            }
            Ok::<(), AppError>(())
        }
        .await;
        if let Err(e) = result {
            tracing::error!(temp_uid, user_id = %user.id, error = %e, "Failed to attribute referral");
        }
    }

    /// Persist the tokens from this login's code exchange.
    async fn store_session(&self, user: &User, tokens: &TokenResponse) -> Result<(), AppError> {
        let existing = self.db.get_session(&user.id, OAuthClient::Discord).await?;
        let fresh = self.new_session(&user.id, tokens)?;
        if existing.is_none() {
            tracing::info!(user_id = %user.id, "Created a new session");
        } else {
            tracing::debug!(user_id = %user.id, "Replaced session tokens");
        }
        self.db
            .set_session(&renew_session(existing.as_ref(), fresh))
            .await
    }

    fn new_session(&self, user_id: &str, tokens: &TokenResponse) -> Result<Session, AppError> {
        let now = Utc::now();
        Ok(Session {
            user_id: user_id.to_string(),
            client: OAuthClient::Discord,
            access_token_encrypted: self
                .cipher
                .encrypt(&tokens.access_token, &token_context(user_id, "access"))?,
            refresh_token_encrypted: self
                .cipher
                .encrypt(&tokens.refresh_token, &token_context(user_id, "refresh"))?,
            access_token_expires_at: expiry_from_now(now, tokens.expires_in),
            scope: tokens.scope.clone(),
            token_type: tokens.token_type.clone(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Book Worm#42"), "book-worm-42");
        assert_eq!(slugify("  --Émile__Zola--  "), "mile-zola");
        assert_eq!(slugify("!!!"), "reader");
        assert_eq!(slugify(&"a".repeat(100)).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn test_slug_candidates() {
        let candidates = slug_candidates("Reader");
        assert_eq!(candidates[0], "reader");
        assert_eq!(candidates[1], "reader-2");
        assert_eq!(candidates.len(), 2 + NUMBERED_SLUG_CANDIDATES as usize);
        assert!(candidates.last().unwrap().starts_with("reader-"));
    }

    fn session(access: &str, created_at: chrono::DateTime<Utc>) -> Session {
        Session {
            user_id: "u1".to_string(),
            client: OAuthClient::Discord,
            access_token_encrypted: access.to_string(),
            refresh_token_encrypted: format!("{access}-refresh"),
            access_token_expires_at: created_at + chrono::Duration::days(7),
            scope: "identify".to_string(),
            token_type: "Bearer".to_string(),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_new_grant_replaces_unexpired_session() {
        let day0 = Utc::now() - chrono::Duration::days(1);
        let stored = session("sealed-t1", day0);
        let mut fresh = session("sealed-t2", Utc::now());
        fresh.scope = OAUTH_SCOPES.join(" ");

        let renewed = renew_session(Some(&stored), fresh.clone());
        assert_eq!(renewed.access_token_encrypted, "sealed-t2");
        assert_eq!(renewed.refresh_token_encrypted, "sealed-t2-refresh");
        assert_eq!(renewed.access_token_expires_at, fresh.access_token_expires_at);
        assert_eq!(renewed.created_at, day0);
        assert!(session_has_required_scopes(&renewed));
    }

    #[test]
    fn test_first_session_kept_as_is() {
        let fresh = session("sealed-t1", Utc::now());
        let renewed = renew_session(None, fresh.clone());
        assert_eq!(renewed.created_at, fresh.created_at);
    }

    #[test]
    fn test_token_context_is_per_user_and_kind() {
        assert_eq!(token_context("u1", "access"), "u1_discord:access");
        assert_ne!(token_context("u1", "access"), token_context("u1", "refresh"));
    }
}
