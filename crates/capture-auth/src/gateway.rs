//! Authorized requests to the Ah-Ha! API.

use crate::capture::SnippetPayload;
use crate::session::{now_ms, SessionOracle};
use crate::{AuthError, AuthResult};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Host connectivity indicator, where the platform has one.
pub trait ConnectivityProbe: Send + Sync {
    fn is_offline(&self) -> bool;
}

/// Sends snippets with the current bearer token.
///
/// The session is invalidated only when the stored expiry has passed or the
/// API answers 401. Failed pre-checks and transport errors leave it alone.
pub struct SnippetGateway {
    api_base_url: String,
    oracle: SessionOracle,
    http_client: Client,
    connectivity: Option<Arc<dyn ConnectivityProbe>>,
}

impl SnippetGateway {
    pub fn new(api_base_url: &str, oracle: SessionOracle) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            oracle,
            http_client: Client::new(),
            connectivity: None,
        }
    }

    /// Attach a connectivity indicator used to classify network failures.
    pub fn with_connectivity(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.connectivity = Some(probe);
        self
    }

    pub fn snippets_url(&self) -> String {
        format!("{}/snippets", self.api_base_url)
    }

    /// POST a snippet. Returns the API's JSON body on success.
    pub async fn send(&self, payload: &SnippetPayload) -> AuthResult<Value> {
        if !self.oracle.is_authenticated() {
            warn!("User not authenticated, snippet not saved");
            return Err(AuthError::Authentication(
                "User not authenticated. Please login via the extension popup.".to_string(),
            ));
        }

        let token = match self.oracle.resolve_token()? {
            Some(token) => token,
            None => {
                error!("Session reports authenticated but no token is stored");
                return Err(AuthError::Authentication(
                    "Authentication token missing. Please login again.".to_string(),
                ));
            }
        };

        if let Some(expiry) = self.oracle.expiry()? {
            if now_ms() > expiry {
                warn!(expired_at_ms = expiry, "Auth token has expired");
                self.oracle.invalidate_quietly();
                return Err(AuthError::TokenExpired);
            }
        }

        debug!(
            url = %self.snippets_url(),
            token_prefix = %token_prefix(&token),
            "Sending snippet"
        );

        let response = self
            .http_client
            .post(self.snippets_url())
            .bearer_auth(&token)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.classify_transport_error(e))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("API returned 401 Unauthorized, clearing session");
            self.oracle.invalidate_quietly();
            return Err(AuthError::Authentication(
                "Authentication failed with API (401). Please login again.".to_string(),
            ));
        }

        if !status.is_success() {
            let fallback = format!(
                "HTTP error {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            );
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or(fallback);
            error!(status = status.as_u16(), message = %message, "API error saving snippet");
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        info!("Snippet saved");
        Ok(body)
    }

    fn classify_transport_error(&self, e: reqwest::Error) -> AuthError {
        if !(e.is_connect() || e.is_timeout()) {
            return AuthError::Http(e);
        }

        error!(error = %e, "Network error reaching API");
        let offline = self
            .connectivity
            .as_ref()
            .is_some_and(|probe| probe.is_offline());
        if offline {
            AuthError::NetworkOffline
        } else {
            AuthError::NetworkUnreachable {
                endpoint: self.api_base_url.clone(),
            }
        }
    }
}

/// `message` or `detail` from a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "detail"].iter().find_map(|field| match value.get(*field) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(Value::String(_)) => None,
        Some(other) => Some(other.to_string()),
    })
}

fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(10).collect();
    format!("{prefix}...")
}
