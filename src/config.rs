//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup; request handlers only ever see the
//! cached `Config` held in `AppState`.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Discord OAuth client ID (public)
    pub discord_client_id: String,
    /// Guild that hosts every club channel
    pub discord_guild_id: String,
    /// Fixed OAuth redirect URI. When unset it is derived from the request host.
    pub discord_redirect_uri: Option<String>,
    /// Name of the staff role whose holders never count toward club capacity
    pub discord_elevated_role: String,
    /// Base URL of the Discord REST API
    pub discord_api_url: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Seconds between passes of the interrupted-deletion sweeper
    pub deletion_sweep_interval_secs: u64,

    // --- Secrets ---
    /// Discord OAuth client secret
    pub discord_client_secret: String,
    /// Discord bot token used for guild and channel management
    pub discord_bot_token: String,
    /// JWT signing key for session cookies (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
    /// Key material for encrypting OAuth tokens at rest
    pub token_encryption_key: Vec<u8>,
}

pub const DEFAULT_DISCORD_API_URL: &str = "https://discord.com/api/v10";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 15 * 60;

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            discord_client_id: required("DISCORD_CLIENT_ID")?,
            discord_guild_id: required("DISCORD_GUILD_ID")?,
            discord_redirect_uri: env::var("DISCORD_REDIRECT_URI")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            discord_elevated_role: env::var("DISCORD_ELEVATED_ROLE")
                .unwrap_or_else(|_| "Admin".to_string()),
            discord_api_url: env::var("DISCORD_API_URL")
                .unwrap_or_else(|_| DEFAULT_DISCORD_API_URL.to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            deletion_sweep_interval_secs: env::var("DELETION_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS),

            discord_client_secret: required("DISCORD_CLIENT_SECRET")?,
            discord_bot_token: required("DISCORD_BOT_TOKEN")?,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
            oauth_state_key: required("OAUTH_STATE_KEY")?.into_bytes(),
            token_encryption_key: required("TOKEN_ENCRYPTION_KEY")?.into_bytes(),
        })
    }

    /// Config for tests only. Points Discord at an address nothing listens on.
    pub fn test_default() -> Self {
        Self {
            discord_client_id: "test_client_id".to_string(),
            discord_guild_id: "100000000000000000".to_string(),
            discord_redirect_uri: None,
            discord_elevated_role: "Admin".to_string(),
            discord_api_url: "http://127.0.0.1:9/api".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            deletion_sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            discord_client_secret: "test_secret".to_string(),
            discord_bot_token: "test_bot_token".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            token_encryption_key: b"test_token_key_32_bytes_minimum!".to_vec(),
        }
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        !(self.frontend_url.starts_with("http://localhost")
            || self.frontend_url.starts_with("http://127.0.0.1"))
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("DISCORD_CLIENT_ID", "test_id");
        env::set_var("DISCORD_CLIENT_SECRET", "test_secret");
        env::set_var("DISCORD_BOT_TOKEN", "bot");
        env::set_var("DISCORD_GUILD_ID", "42");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("OAUTH_STATE_KEY", "state");
        env::set_var("TOKEN_ENCRYPTION_KEY", "tokens");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.discord_client_id, "test_id");
        assert_eq!(config.discord_guild_id, "42");
        assert_eq!(config.discord_elevated_role, "Admin");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_secure_cookies_follow_frontend_scheme() {
        let mut config = Config::test_default();
        assert!(!config.secure_cookies());
        config.frontend_url = "https://buddyreading.example".to_string();
        assert!(config.secure_cookies());
    }
}
