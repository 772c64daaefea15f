//! Storage key constants.

/// Fixed field names of the durable session state.
pub struct SessionKeys;

impl SessionKeys {
    /// Opaque bearer credential
    pub const AUTH_TOKEN: &'static str = "authToken";

    /// Identity token returned alongside the access token
    pub const ID_TOKEN: &'static str = "idToken";

    /// Absolute expiry of the access token, epoch milliseconds
    pub const TOKEN_EXPIRY_TIME: &'static str = "tokenExpiryTime";

    /// Legacy login flag
    pub const USER_LOGGED_IN: &'static str = "ahHaUserLoggedIn";

    /// Nonce of the login flow currently in flight
    pub const OAUTH_NONCE: &'static str = "oauthNonce";
}
