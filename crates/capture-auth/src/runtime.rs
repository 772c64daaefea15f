//! Authentication runtime for the capture client.
//!
//! This module wires the stores, the session oracle, the login flow and the
//! gateway together so the CLI and other front ends share one authority for
//! login/logout/status and saving captures.

use crate::capture::{CapturedSelection, SnippetPayload};
use crate::flow::{AuthFlowController, LoginReport, LoginSuccess};
use crate::gateway::SnippetGateway;
use crate::redirect::InteractiveRedirect;
use crate::session::{now_ms, AuthSnapshot, SessionCache, SessionOracle};
use crate::{AuthError, AuthResult};
use capture_config::{Config, Paths};
use capture_storage::{FileStore, KeyValueStore, NonceStore, TokenStore};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Status reported after a successful logout.
pub const LOGOUT_SUCCESS_STATUS: &str = "Logout successful. Tokens cleared.";

/// Status reported when logout could not clear storage.
pub const LOGOUT_FAILURE_STATUS: &str = "Logout failed to clear tokens.";

/// Shared capture auth runtime.
#[derive(Clone)]
pub struct CaptureAuthRuntime {
    oracle: SessionOracle,
    nonces: NonceStore,
    flow: Arc<AuthFlowController>,
    gateway: Arc<SnippetGateway>,
    login_guard: Arc<Mutex<()>>,
}

impl CaptureAuthRuntime {
    /// Create a runtime over the given storage backend.
    pub fn new(
        config: &Config,
        storage: Arc<dyn KeyValueStore>,
        redirect: Arc<dyn InteractiveRedirect>,
    ) -> Self {
        let oracle = SessionOracle::new(
            TokenStore::new(storage.clone()),
            Arc::new(SessionCache::new()),
        );
        let nonces = NonceStore::new(storage);
        let flow = AuthFlowController::new(
            config.oauth.clone(),
            nonces.clone(),
            oracle.clone(),
            redirect,
        );
        let gateway = SnippetGateway::new(config.api_base(), oracle.clone());

        Self {
            oracle,
            nonces,
            flow: Arc::new(flow),
            gateway: Arc::new(gateway),
            login_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Create a runtime backed by the session file under `paths`.
    pub fn open(
        config: &Config,
        paths: &Paths,
        redirect: Arc<dyn InteractiveRedirect>,
    ) -> AuthResult<Self> {
        paths.ensure_dirs()?;
        let store = FileStore::open(paths.session_file())?;
        Ok(Self::new(config, Arc::new(store), redirect))
    }

    pub fn oracle(&self) -> &SessionOracle {
        &self.oracle
    }

    /// Run a login attempt. Fails with `LoginInProgress` while another
    /// attempt in this runtime has not finished.
    pub async fn login(&self) -> AuthResult<LoginSuccess> {
        let Ok(_guard) = self.login_guard.try_lock() else {
            warn!("Login requested while another login is in flight");
            return Err(AuthError::LoginInProgress);
        };
        self.flow.run().await
    }

    /// Run a login attempt and turn the outcome into its status report.
    pub async fn login_report(&self) -> LoginReport {
        LoginReport::from_result(&self.login().await)
    }

    /// Clear the cache, the stored session and any stray nonce.
    ///
    /// Not serialized against an in-flight login.
    pub fn logout(&self) -> AuthResult<()> {
        let session = self.oracle.invalidate();
        let nonce = self.nonces.clear();
        session?;
        nonce?;
        info!("Logged out");
        Ok(())
    }

    /// Current auth status snapshot.
    pub fn status(&self) -> AuthSnapshot {
        self.oracle.snapshot(now_ms())
    }

    /// Build the snippet from a capture and send it.
    pub async fn save_selection(&self, selection: CapturedSelection) -> AuthResult<Value> {
        let payload = SnippetPayload::try_from(selection)?;
        self.gateway.send(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_token::tests::token_with_claims;
    use async_trait::async_trait;
    use capture_config::OAuthConfig;
    use capture_storage::{MemoryStore, SessionKeys};
    use tempfile::tempdir;
    use tokio::sync::Notify;
    use url::Url;

    const REDIRECT: &str = "http://127.0.0.1:8765/callback";

    /// Redirect that waits for a signal, then answers with a valid callback.
    struct GatedRedirect {
        gate: Notify,
    }

    #[async_trait]
    impl InteractiveRedirect for GatedRedirect {
        async fn launch(&self, url: &Url) -> AuthResult<Option<String>> {
            self.gate.notified().await;
            let nonce = url
                .query_pairs()
                .find(|(k, _)| k == "nonce")
                .map(|(_, v)| v.into_owned())
                .unwrap();
            let id_token = token_with_claims(&serde_json::json!({ "nonce": nonce }));
            Ok(Some(format!(
                "{REDIRECT}#access_token=AT&id_token={id_token}&expires_in=60"
            )))
        }
    }

    fn config() -> Config {
        Config {
            oauth: OAuthConfig {
                client_id: "client-123".to_string(),
                authorization_url: "https://accounts.example.com/auth".to_string(),
                redirect_uri: REDIRECT.to_string(),
                ..OAuthConfig::default()
            },
            ..Config::default()
        }
    }

    fn runtime() -> (Arc<MemoryStore>, Arc<GatedRedirect>, CaptureAuthRuntime) {
        let store = Arc::new(MemoryStore::new());
        let redirect = Arc::new(GatedRedirect {
            gate: Notify::new(),
        });
        let runtime = CaptureAuthRuntime::new(&config(), store.clone(), redirect.clone());
        (store, redirect, runtime)
    }

    #[tokio::test]
    async fn test_login_then_status_then_logout() {
        let (store, redirect, runtime) = runtime();
        redirect.gate.notify_one();

        let report = runtime.login_report().await;
        assert!(report.success, "{report:?}");

        let status = runtime.status();
        assert!(status.authenticated);
        assert!(status.has_token);
        assert!(!status.expired);
        assert!(status.expires_at_ms.is_some());

        runtime.logout().unwrap();
        let status = runtime.status();
        assert!(!status.authenticated);
        assert!(!status.has_token);
        assert_eq!(store.get(SessionKeys::AUTH_TOKEN).unwrap(), None);
    }

    #[tokio::test]
    async fn test_second_login_is_rejected_while_first_runs() {
        let (_, redirect, runtime) = runtime();

        let first = tokio::spawn({
            let runtime = runtime.clone();
            async move { runtime.login().await }
        });
        // let the first login reach the redirect
        while runtime.nonces.peek().unwrap().is_none() {
            tokio::task::yield_now().await;
        }
        let nonce_before = runtime.nonces.peek().unwrap();

        let second = runtime.login().await;
        assert!(matches!(second, Err(AuthError::LoginInProgress)));
        assert_eq!(runtime.nonces.peek().unwrap(), nonce_before);

        redirect.gate.notify_one();
        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_logout_clears_stray_nonce() {
        let (store, _, runtime) = runtime();
        runtime.nonces.issue().unwrap();
        runtime.oracle.record_login("T", "I", None).unwrap();

        runtime.logout().unwrap();

        assert_eq!(store.get(SessionKeys::OAUTH_NONCE).unwrap(), None);
        assert!(!runtime.oracle.is_authenticated());
    }

    #[tokio::test]
    async fn test_save_rejects_empty_capture_before_session_check() {
        let (_, _, runtime) = runtime();
        let err = runtime
            .save_selection(CapturedSelection {
                source_url: "https://example.com".to_string(),
                ..CapturedSelection::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCapture(_)));
    }

    #[tokio::test]
    async fn test_save_requires_login() {
        let (_, _, runtime) = runtime();
        let err = runtime
            .save_selection(CapturedSelection {
                text_content: "some text".to_string(),
                source_url: "https://example.com".to_string(),
                ..CapturedSelection::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Authentication(_)));
    }

    #[test]
    fn test_open_uses_session_file() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let redirect = Arc::new(GatedRedirect {
            gate: Notify::new(),
        });

        let runtime = CaptureAuthRuntime::open(&config(), &paths, redirect.clone()).unwrap();
        runtime.oracle().record_login("T", "I", None).unwrap();

        let reopened = CaptureAuthRuntime::open(&config(), &paths, redirect).unwrap();
        assert!(reopened.status().authenticated);
        assert!(paths.session_file().exists());
    }
}
