//! Typed access to the durable session fields.

use crate::{KeyValueStore, SessionKeys, StorageError, StorageResult};
use std::sync::Arc;

/// One of the four durable session fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    AuthToken,
    IdToken,
    TokenExpiryTime,
    UserLoggedIn,
}

impl SessionField {
    /// Every session field, in storage order.
    pub const ALL: [SessionField; 4] = [
        SessionField::AuthToken,
        SessionField::IdToken,
        SessionField::TokenExpiryTime,
        SessionField::UserLoggedIn,
    ];

    /// Storage key of this field.
    pub fn key(self) -> &'static str {
        match self {
            SessionField::AuthToken => SessionKeys::AUTH_TOKEN,
            SessionField::IdToken => SessionKeys::ID_TOKEN,
            SessionField::TokenExpiryTime => SessionKeys::TOKEN_EXPIRY_TIME,
            SessionField::UserLoggedIn => SessionKeys::USER_LOGGED_IN,
        }
    }
}

/// Snapshot of the requested session fields. Absent fields read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub auth_token: Option<String>,
    pub id_token: Option<String>,
    /// Absolute expiry in epoch milliseconds
    pub token_expiry_time: Option<i64>,
    pub user_logged_in: bool,
}

impl SessionState {
    /// Whether a stored expiry lies strictly before `now_ms`.
    ///
    /// A session without an expiry never expires.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        matches!(self.token_expiry_time, Some(expiry) if now_ms > expiry)
    }
}

/// A batch of field writes applied in one storage operation.
///
/// Fields set to `None` through the builder are removed from storage.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    changes: Vec<(SessionField, Option<String>)>,
}

impl SessionUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The write performed by a completed login.
    ///
    /// A missing expiry removes any expiry left by an earlier session.
    pub fn login(
        auth_token: impl Into<String>,
        id_token: impl Into<String>,
        token_expiry_time: Option<i64>,
    ) -> Self {
        Self::new()
            .auth_token(auth_token)
            .id_token(id_token)
            .token_expiry_time(token_expiry_time)
            .user_logged_in(true)
    }

    pub fn auth_token(self, token: impl Into<String>) -> Self {
        self.with(SessionField::AuthToken, Some(token.into()))
    }

    pub fn id_token(self, token: impl Into<String>) -> Self {
        self.with(SessionField::IdToken, Some(token.into()))
    }

    pub fn token_expiry_time(self, expiry_ms: Option<i64>) -> Self {
        self.with(
            SessionField::TokenExpiryTime,
            expiry_ms.map(|ms| ms.to_string()),
        )
    }

    pub fn user_logged_in(self, logged_in: bool) -> Self {
        self.with(SessionField::UserLoggedIn, Some(logged_in.to_string()))
    }

    /// Whether no field is touched.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    fn with(mut self, field: SessionField, value: Option<String>) -> Self {
        self.changes.retain(|(existing, _)| *existing != field);
        self.changes.push((field, value));
        self
    }
}

/// Reads and writes the session fields on a shared backend.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    /// Create a token store on the given storage backend
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// Apply a batch of field writes.
    pub fn write(&self, update: &SessionUpdate) -> StorageResult<()> {
        if update.is_empty() {
            return Ok(());
        }

        let changes: Vec<(&str, Option<String>)> = update
            .changes
            .iter()
            .map(|(field, value)| (field.key(), value.clone()))
            .collect();
        self.storage.apply(&changes)
    }

    /// Read the requested fields. Fields not requested stay empty.
    pub fn read(&self, fields: &[SessionField]) -> StorageResult<SessionState> {
        let mut state = SessionState::default();

        for field in fields {
            let Some(raw) = self.storage.get(field.key())? else {
                continue;
            };

            match field {
                SessionField::AuthToken => state.auth_token = non_empty(raw),
                SessionField::IdToken => state.id_token = non_empty(raw),
                SessionField::TokenExpiryTime => {
                    state.token_expiry_time = parse_expiry(&raw)?;
                }
                SessionField::UserLoggedIn => state.user_logged_in = parse_flag(&raw)?,
            }
        }

        Ok(state)
    }

    /// Read all four fields.
    pub fn read_all(&self) -> StorageResult<SessionState> {
        self.read(&SessionField::ALL)
    }

    /// Remove the named fields. Missing fields are ignored.
    pub fn clear(&self, fields: &[SessionField]) -> StorageResult<()> {
        let keys: Vec<&str> = fields.iter().map(|field| field.key()).collect();
        self.storage.delete_many(&keys)
    }

    /// Remove all four session fields.
    pub fn clear_session(&self) -> StorageResult<()> {
        self.clear(&SessionField::ALL)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_expiry(raw: &str) -> StorageResult<Option<i64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| StorageError::Encoding(format!("invalid token expiry time: {raw}")))
}

fn parse_flag(raw: &str) -> StorageResult<bool> {
    match raw.trim() {
        "true" => Ok(true),
        "false" | "" => Ok(false),
        other => Err(StorageError::Encoding(format!(
            "invalid logged-in flag: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn store() -> (Arc<MemoryStore>, TokenStore) {
        let backend = Arc::new(MemoryStore::new());
        let tokens = TokenStore::new(backend.clone());
        (backend, tokens)
    }

    #[test]
    fn test_write_then_read_auth_token() {
        let (_, tokens) = store();
        tokens
            .write(&SessionUpdate::new().auth_token("T1"))
            .unwrap();

        let state = tokens.read(&[SessionField::AuthToken]).unwrap();
        assert_eq!(state.auth_token, Some("T1".to_string()));
    }

    #[test]
    fn test_read_absent_fields_is_empty() {
        let (_, tokens) = store();
        let state = tokens.read_all().unwrap();
        assert_eq!(state, SessionState::default());
        assert!(!state.user_logged_in);
    }

    #[test]
    fn test_read_only_requested_fields() {
        let (_, tokens) = store();
        tokens
            .write(&SessionUpdate::login("T1", "I1", Some(5_000)))
            .unwrap();

        let state = tokens.read(&[SessionField::IdToken]).unwrap();
        assert_eq!(state.id_token, Some("I1".to_string()));
        assert_eq!(state.auth_token, None);
        assert_eq!(state.token_expiry_time, None);
    }

    #[test]
    fn test_login_write_encodes_fields() {
        let (backend, tokens) = store();
        tokens
            .write(&SessionUpdate::login("T1", "I1", Some(1_700_000_000_000)))
            .unwrap();

        assert_eq!(
            backend.get(SessionKeys::TOKEN_EXPIRY_TIME).unwrap(),
            Some("1700000000000".to_string())
        );
        assert_eq!(
            backend.get(SessionKeys::USER_LOGGED_IN).unwrap(),
            Some("true".to_string())
        );

        let state = tokens.read_all().unwrap();
        assert_eq!(state.auth_token, Some("T1".to_string()));
        assert_eq!(state.token_expiry_time, Some(1_700_000_000_000));
        assert!(state.user_logged_in);
    }

    #[test]
    fn test_login_without_expiry_drops_stale_expiry() {
        let (_, tokens) = store();
        tokens
            .write(&SessionUpdate::login("OLD", "I0", Some(10)))
            .unwrap();
        tokens.write(&SessionUpdate::login("NEW", "I1", None)).unwrap();

        let state = tokens.read_all().unwrap();
        assert_eq!(state.auth_token, Some("NEW".to_string()));
        assert_eq!(state.token_expiry_time, None);
        assert!(!state.is_expired_at(i64::MAX));
    }

    #[test]
    fn test_clear_named_fields_only() {
        let (_, tokens) = store();
        tokens
            .write(&SessionUpdate::login("T1", "I1", Some(5_000)))
            .unwrap();

        tokens.clear(&[SessionField::AuthToken]).unwrap();

        let state = tokens.read_all().unwrap();
        assert_eq!(state.auth_token, None);
        assert_eq!(state.id_token, Some("I1".to_string()));
    }

    #[test]
    fn test_clear_session_leaves_nonce() {
        let (backend, tokens) = store();
        backend.set(SessionKeys::OAUTH_NONCE, "n").unwrap();
        tokens
            .write(&SessionUpdate::login("T1", "I1", Some(5_000)))
            .unwrap();

        tokens.clear_session().unwrap();

        assert_eq!(tokens.read_all().unwrap(), SessionState::default());
        assert_eq!(
            backend.get(SessionKeys::OAUTH_NONCE).unwrap(),
            Some("n".to_string())
        );
    }

    #[test]
    fn test_bad_encoding_is_reported() {
        let (backend, tokens) = store();
        backend.set(SessionKeys::TOKEN_EXPIRY_TIME, "soon").unwrap();
        assert!(matches!(
            tokens.read(&[SessionField::TokenExpiryTime]),
            Err(StorageError::Encoding(_))
        ));

        backend.set(SessionKeys::USER_LOGGED_IN, "yes").unwrap();
        assert!(matches!(
            tokens.read(&[SessionField::UserLoggedIn]),
            Err(StorageError::Encoding(_))
        ));
    }

    #[test]
    fn test_expiry_boundary() {
        let state = SessionState {
            token_expiry_time: Some(1_000),
            ..SessionState::default()
        };
        assert!(!state.is_expired_at(1_000));
        assert!(state.is_expired_at(1_001));
    }
}
