//! Authentication error types.

use std::fmt;
use thiserror::Error;

/// Why the nonce check of a login callback failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonceFailure {
    /// No nonce was stored when the callback arrived
    SetupMissing,
    /// The callback carried no identity token
    IdTokenMissing,
    /// The identity token has no `nonce` claim
    MissingClaim,
    /// The claim differs from the stored nonce
    Mismatch,
    /// The identity token could not be decoded
    Parse(String),
}

impl NonceFailure {
    /// User-facing reason, rendered after "OAuth flow failed: ".
    pub fn reason(&self) -> &'static str {
        match self {
            NonceFailure::SetupMissing => "Nonce verification setup error.",
            NonceFailure::IdTokenMissing => "ID token missing from response.",
            NonceFailure::MissingClaim => "Nonce claim missing in ID token.",
            NonceFailure::Mismatch => "Nonce mismatch. Security check failed.",
            NonceFailure::Parse(_) => "Could not parse ID token.",
        }
    }
}

impl fmt::Display for NonceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonceFailure::Parse(detail) => write!(f, "{} ({})", self.reason(), detail),
            _ => f.write_str(self.reason()),
        }
    }
}

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Client id or authorization endpoint missing or left at a placeholder
    #[error("OAuth not configured: {0}")]
    NotConfigured(String),

    /// The interactive redirect returned nothing or failed
    #[error("OAuth flow failed or cancelled: {0}")]
    FlowCancelledOrFailed(String),

    /// Nonce check of the callback failed
    #[error("Nonce verification failed: {0}")]
    NonceVerification(NonceFailure),

    /// The provider omitted the access token; carries its `error` parameter
    #[error("No access token received: {0}")]
    TokenMissing(String),

    /// No session, or the API rejected the token
    #[error("{0}")]
    Authentication(String),

    /// Stored expiry has passed
    #[error("Authentication token has expired. Please login again via the extension popup.")]
    TokenExpired,

    /// Non-success, non-401 API response
    #[error("API Error {status}: {message}")]
    Api { status: u16, message: String },

    /// Host reports no connectivity
    #[error("Network error: You appear to be offline. Please check your connection.")]
    NetworkOffline,

    /// Connection to the API failed
    #[error("Network error. Unable to connect to Ah-Ha! server. Is the backend running at {endpoint}?")]
    NetworkUnreachable { endpoint: String },

    /// Capture has nothing to save
    #[error("Invalid capture: {0}")]
    InvalidCapture(String),

    /// A login is already running in this process
    #[error("A login is already in progress")]
    LoginInProgress,

    /// Invalid state transition in the login FSM
    #[error("Invalid login state transition: {0}")]
    InvalidStateTransition(String),

    /// The login nonce could not be stored
    #[error("Nonce storage failed: {0}")]
    NonceSetup(#[source] capture_storage::StorageError),

    /// Configuration or path error
    #[error(transparent)]
    Core(#[from] capture_config::CoreError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] capture_storage::StorageError),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl AuthError {
    /// Status line shown to the user for a failed login.
    pub fn status_message(&self) -> String {
        match self {
            AuthError::NotConfigured(_) => "OAuth not configured.".to_string(),
            AuthError::FlowCancelledOrFailed(_) => "OAuth flow failed or cancelled.".to_string(),
            AuthError::NonceVerification(failure) => {
                format!("OAuth flow failed: {}", failure.reason())
            }
            AuthError::TokenMissing(_) => "OAuth flow failed: No access token received.".to_string(),
            AuthError::LoginInProgress => "Login already in progress.".to_string(),
            AuthError::NonceSetup(_) => "OAuth setup failed (nonce storage).".to_string(),
            _ => "OAuth flow threw an exception.".to_string(),
        }
    }

    /// Detail accompanying [`AuthError::status_message`], if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            AuthError::NotConfigured(detail)
            | AuthError::FlowCancelledOrFailed(detail)
            | AuthError::TokenMissing(detail) => Some(detail.clone()),
            AuthError::NonceVerification(NonceFailure::Parse(detail)) => Some(detail.clone()),
            AuthError::NonceVerification(_) | AuthError::LoginInProgress => None,
            other => Some(other.to_string()),
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_status_messages() {
        assert_eq!(
            AuthError::NonceVerification(NonceFailure::Mismatch).status_message(),
            "OAuth flow failed: Nonce mismatch. Security check failed."
        );
        assert_eq!(
            AuthError::NonceVerification(NonceFailure::SetupMissing).status_message(),
            "OAuth flow failed: Nonce verification setup error."
        );
        assert_eq!(
            AuthError::NonceVerification(NonceFailure::Parse("bad".into())).status_message(),
            "OAuth flow failed: Could not parse ID token."
        );
    }

    #[test]
    fn test_token_missing_keeps_provider_error() {
        let err = AuthError::TokenMissing("access_denied".to_string());
        assert_eq!(err.status_message(), "OAuth flow failed: No access token received.");
        assert_eq!(err.detail(), Some("access_denied".to_string()));
    }

    #[test]
    fn test_api_error_display() {
        let err = AuthError::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API Error 500: boom");
    }

    #[test]
    fn test_network_unreachable_names_endpoint() {
        let err = AuthError::NetworkUnreachable {
            endpoint: "http://localhost:8010/api/v1".to_string(),
        };
        assert!(err.to_string().contains("http://localhost:8010/api/v1"));
    }
}
