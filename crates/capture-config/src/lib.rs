//! Configuration, file system paths and logging for the Ah-Ha! capture client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, OAuthConfig, DEFAULT_API_BASE_URL, DEFAULT_AUTHORIZATION_URL, DEFAULT_CLIENT_ID,
    DEFAULT_REDIRECT_URI, DEFAULT_SCOPES, PLACEHOLDER_AUTHORIZATION_URL, PLACEHOLDER_CLIENT_ID,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
