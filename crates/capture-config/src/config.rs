//! Configuration management for the capture client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Client identifier shipped in unconfigured builds.
pub const PLACEHOLDER_CLIENT_ID: &str = "YOUR_OAUTH_CLIENT_ID";

/// Authorization endpoint shipped in unconfigured builds.
pub const PLACEHOLDER_AUTHORIZATION_URL: &str = "YOUR_OAUTH_PROVIDER_AUTH_URL";

/// Default OAuth client id (can be overridden at compile time via AHHA_OAUTH_CLIENT_ID env var).
pub const DEFAULT_CLIENT_ID: &str = match option_env!("AHHA_OAUTH_CLIENT_ID") {
    Some(id) => id,
    None => PLACEHOLDER_CLIENT_ID,
};

/// Default authorization endpoint (can be overridden at compile time via
/// AHHA_OAUTH_AUTHORIZATION_URL env var).
pub const DEFAULT_AUTHORIZATION_URL: &str = match option_env!("AHHA_OAUTH_AUTHORIZATION_URL") {
    Some(url) => url,
    None => PLACEHOLDER_AUTHORIZATION_URL,
};

/// Default Ah-Ha! API base URL (can be overridden at compile time via AHHA_API_BASE_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("AHHA_API_BASE_URL") {
    Some(url) => url,
    None => "http://localhost:8010/api/v1",
};

/// Default scopes requested from the identity provider.
pub const DEFAULT_SCOPES: &str = "email profile openid";

/// Default redirect target served by the loopback callback listener.
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8765/callback";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// OAuth2 implicit-flow settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Client identifier registered with the identity provider.
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Authorization endpoint of the identity provider.
    #[serde(default = "default_authorization_url")]
    pub authorization_url: String,
    /// Redirect target the provider sends the browser back to.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    /// Space-separated scopes.
    #[serde(default = "default_scopes")]
    pub scopes: String,
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_authorization_url() -> String {
    DEFAULT_AUTHORIZATION_URL.to_string()
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_scopes() -> String {
    DEFAULT_SCOPES.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
            authorization_url: default_authorization_url(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
        }
    }
}

impl OAuthConfig {
    /// Check that the client id and authorization endpoint are usable.
    ///
    /// Empty values and the shipped placeholders are rejected, and the
    /// authorization endpoint must be an absolute URL.
    pub fn validate(&self) -> CoreResult<()> {
        let client_id = self.client_id.trim();
        if client_id.is_empty() || client_id == PLACEHOLDER_CLIENT_ID {
            return Err(CoreError::Config("Client ID missing.".to_string()));
        }

        let authorization_url = self.authorization_url.trim();
        if authorization_url.is_empty() || authorization_url == PLACEHOLDER_AUTHORIZATION_URL {
            return Err(CoreError::Config("Auth URL missing.".to_string()));
        }

        Url::parse(authorization_url)?;
        Url::parse(&self.redirect_uri)?;
        Ok(())
    }
}

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the Ah-Ha! REST API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// OAuth2 settings.
    #[serde(default)]
    pub oauth: OAuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            oauth: OAuthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `config.json` under the base directory,
    /// falling back to defaults, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = get("AHHA_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = get("AHHA_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(client_id) = get("AHHA_OAUTH_CLIENT_ID") {
            self.oauth.client_id = client_id;
        }
        if let Some(url) = get("AHHA_OAUTH_AUTHORIZATION_URL") {
            self.oauth.authorization_url = url;
        }
    }

    /// API base URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

}
