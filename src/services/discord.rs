// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discord REST client.
//!
//! Handles:
//! - OAuth2 code exchange and token refresh for user logins
//! - Reading the current user and adding them to the guild
//! - Bot operations on the club guild: snapshot, channel create/delete,
//!   member permission overwrites

use crate::config::Config;
use crate::error::AppError;
use crate::services::guild::GuildSnapshot;
use crate::services::permissions::{PermissionOverwrite, Permissions, Role, OVERWRITE_MEMBER};
use serde::{Deserialize, Serialize};

/// Scopes requested at login.
pub const OAUTH_SCOPES: &[&str] = &["identify", "email", "guilds.join", "gdm.join"];

/// Guild text channel type.
pub const CHANNEL_TYPE_TEXT: u8 = 0;

// Discord's maximum page size for the member list.
const MEMBERS_PAGE_SIZE: usize = 1000;

/// Discord REST API client.
#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    bot_token: String,
    guild_id: String,
}

impl DiscordClient {
    /// Create a client for the configured application and guild.
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.discord_api_url.trim_end_matches('/').to_string(),
            client_id: config.discord_client_id.clone(),
            client_secret: config.discord_client_secret.clone(),
            bot_token: config.discord_bot_token.clone(),
            guild_id: config.discord_guild_id.clone(),
        }
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    /// URL the browser is sent to for the authorization step.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/oauth2/authorize?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&prompt=none",
            self.base_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&OAUTH_SCOPES.join(" ")),
            urlencoding::encode(state),
        )
    }

    // ─── OAuth ───────────────────────────────────────────────────

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Discord(format!("Token request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// The user an access token belongs to.
    pub async fn get_current_user(&self, access_token: &str) -> Result<DiscordUser, AppError> {
        let response = self
            .http
            .get(format!("{}/users/@me", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Discord(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Add a user to the guild using their `guilds.join` grant.
    ///
    /// Already-present members are left untouched by Discord.
    pub async fn add_guild_member(
        &self,
        discord_id: &str,
        access_token: &str,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .put(format!(
                "{}/guilds/{}/members/{}",
                self.base_url, self.guild_id, discord_id
            ))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .json(&serde_json::json!({ "access_token": access_token }))
            .send()
            .await
            .map_err(|e| AppError::Discord(e.to_string()))?;

        self.check_response(response).await
    }

    // ─── Guild (bot) ─────────────────────────────────────────────

    /// Read roles, channels and members of the guild in one pass.
    pub async fn guild_snapshot(&self) -> Result<GuildSnapshot, AppError> {
        let guild_path = format!("/guilds/{}", self.guild_id);
        let channels_path = format!("/guilds/{}/channels", self.guild_id);
        let (guild, channels, members) = tokio::try_join!(
            self.bot_get::<Guild>(&guild_path),
            self.bot_get::<Vec<Channel>>(&channels_path),
            self.list_members(),
        )?;

        tracing::debug!(
            channels = channels.len(),
            members = members.len(),
            "Fetched guild snapshot"
        );

        Ok(GuildSnapshot::new(guild, channels, members))
    }

    async fn list_members(&self) -> Result<Vec<GuildMember>, AppError> {
        let mut members: Vec<GuildMember> = Vec::new();
        let mut after = "0".to_string();

        loop {
            let page: Vec<GuildMember> = self
                .bot_get(&format!(
                    "/guilds/{}/members?limit={}&after={}",
                    self.guild_id, MEMBERS_PAGE_SIZE, after
                ))
                .await?;
            let full_page = page.len() == MEMBERS_PAGE_SIZE;
            if let Some(last) = page.last() {
                after = last.user.id.clone();
            }
            members.extend(page);
            if !full_page {
                return Ok(members);
            }
        }
    }

    /// Create a text channel in the guild.
    pub async fn create_text_channel(&self, request: &CreateChannel) -> Result<Channel, AppError> {
        let response = self
            .http
            .post(format!("{}/guilds/{}/channels", self.base_url, self.guild_id))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Discord(e.to_string()))?;

        let channel: Channel = self.check_response_json(response).await?;
        tracing::info!(channel_id = %channel.id, "Created Discord channel");
        Ok(channel)
    }

    /// Delete a channel. A missing channel surfaces as
    /// [`AppError::DISCORD_NOT_FOUND`].
    pub async fn delete_channel(&self, channel_id: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(format!("{}/channels/{}", self.base_url, channel_id))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .send()
            .await
            .map_err(|e| AppError::Discord(e.to_string()))?;

        self.check_response(response).await?;
        tracing::info!(channel_id, "Deleted Discord channel");
        Ok(())
    }

    /// Create or replace a member's permission overwrite on a channel.
    pub async fn edit_member_overwrite(
        &self,
        channel_id: &str,
        discord_id: &str,
        allow: Permissions,
        deny: Permissions,
    ) -> Result<(), AppError> {
        let body = EditOverwrite {
            kind: OVERWRITE_MEMBER,
            allow,
            deny,
        };
        let response = self
            .http
            .put(format!(
                "{}/channels/{}/permissions/{}",
                self.base_url, channel_id, discord_id
            ))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Discord(e.to_string()))?;

        self.check_response(response).await
    }

    fn bot_auth(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    async fn bot_get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, AppError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(reqwest::header::AUTHORIZATION, self.bot_auth())
            .send()
            .await
            .map_err(|e| AppError::Discord(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_for(response).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Discord(format!("Failed to parse response: {}", e)))
    }

    async fn error_for(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            404 => AppError::Discord(AppError::DISCORD_NOT_FOUND.to_string()),
            429 => {
                tracing::warn!("Discord rate limit hit (429)");
                AppError::Discord(format!("Rate limited: {}", body))
            }
            _ => AppError::Discord(format!("HTTP {}: {}", status, body)),
        }
    }
}

// ─── Wire types ──────────────────────────────────────────────────

/// OAuth token response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// A Discord user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub email: Option<String>,
}

impl DiscordUser {
    /// Avatar image URL, when the user has set one.
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_ref()
            .map(|hash| format!("https://cdn.discordapp.com/avatars/{}/{}.png", self.id, hash))
    }
}

/// A guild member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildMember {
    pub user: DiscordUser,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub nick: Option<String>,
}

/// The guild object (only the fields used here).
#[derive(Debug, Clone, Deserialize)]
pub struct Guild {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// A guild channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nsfw: bool,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

/// Body of a channel creation request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateChannel {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    pub nsfw: bool,
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

#[derive(Serialize)]
struct EditOverwrite {
    #[serde(rename = "type")]
    kind: u8,
    allow: Permissions,
    deny: Permissions,
}
