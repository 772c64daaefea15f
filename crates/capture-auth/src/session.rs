//! Session state: the in-process cache and the oracle that reconciles it
//! with durable storage.
//!
//! Durable storage is the source of truth across restarts. The cache only
//! saves a storage read once a token is known in this process: it is filled
//! on a miss and invalidated whenever the session is cleared.

use capture_storage::{SessionField, SessionUpdate, StorageResult, TokenStore};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// What the cache currently believes about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedSession {
    pub auth_token: Option<String>,
    pub user_logged_in: bool,
}

impl CachedSession {
    /// Logged in with a non-empty token: answers without touching storage.
    pub fn is_authoritative(&self) -> bool {
        self.user_logged_in && self.auth_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Volatile mirror of the session, shared by the oracle and the gateway.
///
/// Starts empty and is lost when the process exits.
#[derive(Debug, Default)]
pub struct SessionCache {
    inner: Mutex<CachedSession>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CachedSession {
        self.inner.lock().unwrap().clone()
    }

    /// Record a known token; implies logged in.
    pub fn fill(&self, auth_token: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.auth_token = Some(auth_token.to_string());
        inner.user_logged_in = true;
    }

    /// Record a logged-in session whose token is not known.
    pub fn mark_logged_in(&self) {
        self.inner.lock().unwrap().user_logged_in = true;
    }

    /// Forget everything.
    pub fn invalidate(&self) {
        *self.inner.lock().unwrap() = CachedSession::default();
    }
}

/// Status view of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    pub has_token: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<i64>,
    pub expired: bool,
}

/// Answers whether the caller is authenticated.
#[derive(Clone)]
pub struct SessionOracle {
    tokens: TokenStore,
    cache: Arc<SessionCache>,
}

impl SessionOracle {
    pub fn new(tokens: TokenStore, cache: Arc<SessionCache>) -> Self {
        Self { tokens, cache }
    }

    pub fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Cache first, then durable storage. A storage error reads as logged out.
    ///
    /// Either a stored token or the legacy logged-in flag is enough.
    pub fn is_authenticated(&self) -> bool {
        if self.cache.snapshot().is_authoritative() {
            return true;
        }

        let state = match self
            .tokens
            .read(&[SessionField::AuthToken, SessionField::UserLoggedIn])
        {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Failed to read session state, treating as logged out");
                self.cache.invalidate();
                return false;
            }
        };

        if let Some(token) = state.auth_token.as_deref() {
            self.cache.fill(token);
            true
        } else if state.user_logged_in {
            debug!("Legacy logged-in flag set without a token");
            self.cache.mark_logged_in();
            true
        } else {
            self.cache.invalidate();
            false
        }
    }

    /// Persist a completed login, then mirror it in the cache.
    pub fn record_login(
        &self,
        auth_token: &str,
        id_token: &str,
        token_expiry_time: Option<i64>,
    ) -> StorageResult<()> {
        self.tokens.write(&SessionUpdate::login(
            auth_token,
            id_token,
            token_expiry_time,
        ))?;
        self.cache.fill(auth_token);
        Ok(())
    }

    /// Clear the cache and all four durable fields together.
    ///
    /// The cache is cleared even when the durable clear fails.
    pub fn invalidate(&self) -> StorageResult<()> {
        self.cache.invalidate();
        self.tokens.clear_session()
    }

    /// Like [`SessionOracle::invalidate`], logging instead of returning a
    /// storage failure. For paths that are already reporting another error.
    pub fn invalidate_quietly(&self) {
        if let Err(e) = self.invalidate() {
            warn!(error = %e, "Failed to clear stored session");
        }
    }

    /// Effective token: the cached one if present, else the stored one.
    pub fn resolve_token(&self) -> StorageResult<Option<String>> {
        if let Some(token) = self.cache.snapshot().auth_token.filter(|t| !t.is_empty()) {
            return Ok(Some(token));
        }
        Ok(self.tokens.read(&[SessionField::AuthToken])?.auth_token)
    }

    /// Stored expiry in epoch milliseconds.
    pub fn expiry(&self) -> StorageResult<Option<i64>> {
        Ok(self
            .tokens
            .read(&[SessionField::TokenExpiryTime])?
            .token_expiry_time)
    }

    /// Build a status view at `now_ms`.
    pub fn snapshot(&self, now_ms: i64) -> AuthSnapshot {
        let authenticated = self.is_authenticated();
        let has_token = matches!(self.resolve_token(), Ok(Some(_)));
        let expires_at_ms = self.expiry().ok().flatten();
        let expired = matches!(expires_at_ms, Some(expiry) if now_ms > expiry);

        AuthSnapshot {
            authenticated,
            has_token,
            expires_at_ms,
            expired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture_storage::{
        KeyValueStore, MemoryStore, SessionKeys, StorageError,
    };
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Memory store whose reads can be made to fail, counting reads.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: AtomicBool,
        reads: AtomicUsize,
    }

    impl KeyValueStore for FlakyStore {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(StorageError::Backend("read failed".to_string()));
            }
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            self.inner.delete(key)
        }
    }

    fn create_test_oracle() -> (Arc<FlakyStore>, SessionOracle) {
        let store = Arc::new(FlakyStore::default());
        let oracle = SessionOracle::new(TokenStore::new(store.clone()), Arc::new(SessionCache::new()));
        (store, oracle)
    }

    #[test]
    fn test_not_authenticated_when_empty() {
        let (_, oracle) = create_test_oracle();
        assert!(!oracle.is_authenticated());
        assert_eq!(oracle.cache().snapshot(), CachedSession::default());
    }

    #[test]
    fn test_login_is_served_from_cache() {
        let (store, oracle) = create_test_oracle();
        oracle.record_login("X", "I", None).unwrap();

        store.fail_reads.store(true, Ordering::SeqCst);
        let reads_before = store.reads.load(Ordering::SeqCst);

        assert!(oracle.is_authenticated());
        assert_eq!(store.reads.load(Ordering::SeqCst), reads_before);
    }

    #[test]
    fn test_storage_failure_fails_closed() {
        let (store, oracle) = create_test_oracle();
        oracle.cache().mark_logged_in();
        store.fail_reads.store(true, Ordering::SeqCst);

        assert!(!oracle.is_authenticated());
        assert_eq!(oracle.cache().snapshot(), CachedSession::default());
    }

    #[test]
    fn test_durable_token_fills_cache() {
        let (store, oracle) = create_test_oracle();
        store.set(SessionKeys::AUTH_TOKEN, "T1").unwrap();
        store.set(SessionKeys::USER_LOGGED_IN, "true").unwrap();

        assert!(oracle.is_authenticated());
        let cached = oracle.cache().snapshot();
        assert_eq!(cached.auth_token, Some("T1".to_string()));
        assert!(cached.user_logged_in);

        // second check needs no storage
        store.fail_reads.store(true, Ordering::SeqCst);
        assert!(oracle.is_authenticated());
    }

    #[test]
    fn test_legacy_flag_alone_is_authenticated() {
        let (store, oracle) = create_test_oracle();
        store.set(SessionKeys::USER_LOGGED_IN, "true").unwrap();

        assert!(oracle.is_authenticated());
        let cached = oracle.cache().snapshot();
        assert!(cached.user_logged_in);
        assert_eq!(cached.auth_token, None);
        assert!(!cached.is_authoritative());
    }

    #[test]
    fn test_invalidate_clears_both_tiers() {
        let (store, oracle) = create_test_oracle();
        oracle.record_login("X", "I", Some(10)).unwrap();

        oracle.invalidate().unwrap();

        assert_eq!(oracle.cache().snapshot(), CachedSession::default());
        for key in [
            SessionKeys::AUTH_TOKEN,
            SessionKeys::ID_TOKEN,
            SessionKeys::TOKEN_EXPIRY_TIME,
            SessionKeys::USER_LOGGED_IN,
        ] {
            assert_eq!(store.get(key).unwrap(), None, "{key} should be cleared");
        }
        assert!(!oracle.is_authenticated());
    }

    #[test]
    fn test_resolve_token_prefers_cache() {
        let (store, oracle) = create_test_oracle();
        store.set(SessionKeys::AUTH_TOKEN, "STORED").unwrap();
        oracle.cache().fill("CACHED");

        assert_eq!(oracle.resolve_token().unwrap(), Some("CACHED".to_string()));

        oracle.cache().invalidate();
        assert_eq!(oracle.resolve_token().unwrap(), Some("STORED".to_string()));
    }

    #[test]
    fn test_snapshot_reports_expiry() {
        let (_, oracle) = create_test_oracle();
        oracle.record_login("X", "I", Some(1_000)).unwrap();

        let snapshot = oracle.snapshot(2_000);
        assert!(snapshot.authenticated);
        assert!(snapshot.has_token);
        assert_eq!(snapshot.expires_at_ms, Some(1_000));
        assert!(snapshot.expired);

        assert!(!oracle.snapshot(1_000).expired);
    }
}
