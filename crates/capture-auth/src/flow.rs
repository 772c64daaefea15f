//! OAuth2 implicit-flow login with nonce verification.
//!
//! One call to [`AuthFlowController::run`] is one login attempt. The nonce
//! it issues is cleared exactly once when the attempt ends, whatever the
//! outcome.
//!
//! Session invalidation depends on how far the attempt got, not on the error
//! kind. Any failure after the nonce was stored, storage and transport
//! errors included, clears the cache and all four durable session fields.
//! Failures before that point (not configured, nonce storage) leave the
//! existing session untouched.

use crate::auth_fsm::{LoginMachine, LoginMachineInput, LoginPhase};
use crate::id_token::nonce_claim;
use crate::redirect::InteractiveRedirect;
use crate::session::{now_ms, SessionOracle};
use crate::{AuthError, AuthResult, NonceFailure};
use capture_config::{CoreError, OAuthConfig};
use capture_storage::NonceStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Response type requesting both an access token and an identity token.
pub const RESPONSE_TYPE: &str = "token id_token";

/// Status reported for a completed login.
pub const LOGIN_SUCCESS_STATUS: &str = "Login successful. Tokens stored.";

/// Warning attached to a successful login whose nonce could not be cleared.
pub const NONCE_CLEAR_WARNING: &str = "Login nonce could not be cleared from storage.";

/// Parameters carried in the fragment of the terminal redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse the part after `#` as query-encoded parameters.
    pub fn from_redirect_url(redirect_url: &str) -> Self {
        let fragment = redirect_url
            .split_once('#')
            .map(|(_, fragment)| fragment)
            .unwrap_or("");

        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "access_token" => params.access_token = value,
                "id_token" => params.id_token = value,
                "expires_in" => params.expires_in = value,
                "error" => params.error = value,
                _ => {}
            }
        }
        params
    }

    /// Absolute expiry for a token issued at `issued_at_ms`.
    pub fn expiry_from(&self, issued_at_ms: i64) -> Option<i64> {
        let raw = self.expires_in.as_deref()?;
        match raw.trim().parse::<i64>() {
            Ok(secs) => secs
                .checked_mul(1000)
                .and_then(|ms| issued_at_ms.checked_add(ms)),
            Err(_) => {
                warn!(expires_in = %raw, "Ignoring unparseable expires_in");
                None
            }
        }
    }
}

/// Outcome of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub token_expiry_time: Option<i64>,
    /// False when the nonce survived the attempt because clearing it failed.
    pub nonce_cleared: bool,
}

/// The single terminal report of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginReport {
    pub success: bool,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl LoginReport {
    pub fn from_result(result: &AuthResult<LoginSuccess>) -> Self {
        match result {
            Ok(success) => Self {
                success: true,
                status: LOGIN_SUCCESS_STATUS.to_string(),
                error: None,
                warning: (!success.nonce_cleared).then(|| NONCE_CLEAR_WARNING.to_string()),
            },
            Err(e) => Self {
                success: false,
                status: e.status_message(),
                error: e.detail(),
                warning: None,
            },
        }
    }
}

/// Drives the login handshake against the identity provider.
pub struct AuthFlowController {
    oauth: OAuthConfig,
    nonces: NonceStore,
    oracle: SessionOracle,
    redirect: Arc<dyn InteractiveRedirect>,
}

impl AuthFlowController {
    pub fn new(
        oauth: OAuthConfig,
        nonces: NonceStore,
        oracle: SessionOracle,
        redirect: Arc<dyn InteractiveRedirect>,
    ) -> Self {
        Self {
            oauth,
            nonces,
            oracle,
            redirect,
        }
    }

    /// Authorization request for the given nonce.
    pub fn authorization_url(&self, nonce: &str) -> AuthResult<Url> {
        let mut url = Url::parse(self.oauth.authorization_url.trim())?;
        url.query_pairs_mut()
            .append_pair("client_id", self.oauth.client_id.trim())
            .append_pair("redirect_uri", &self.oauth.redirect_uri)
            .append_pair("response_type", RESPONSE_TYPE)
            .append_pair("scope", &self.oauth.scopes)
            .append_pair("nonce", nonce);
        Ok(url)
    }

    /// Run one login attempt to completion.
    pub async fn run(&self) -> AuthResult<LoginSuccess> {
        let mut machine = LoginMachine::new();
        let result = self.attempt(&mut machine).await;
        let phase = LoginPhase::from(machine.state());

        // The machine leaves Idle only once the nonce is stored.
        let nonce_issued = phase != LoginPhase::Idle;
        let mut nonce_cleared = true;
        if nonce_issued {
            if let Err(e) = self.nonces.clear() {
                error!(error = %e, "Failed to clear login nonce");
                nonce_cleared = false;
            }
        }

        match result {
            Ok(mut success) => {
                success.nonce_cleared = nonce_cleared;
                info!(
                    expires_at_ms = ?success.token_expiry_time,
                    "Login successful"
                );
                Ok(success)
            }
            Err(e) => {
                if nonce_issued {
                    self.oracle.invalidate_quietly();
                }
                if machine.consume(&LoginMachineInput::Abort).is_err() {
                    debug!(phase = ?phase, "Login machine already terminal");
                }
                warn!(phase = ?phase, error = %e, "Login failed");
                Err(e)
            }
        }
    }

    async fn attempt(&self, machine: &mut LoginMachine) -> AuthResult<LoginSuccess> {
        self.oauth.validate().map_err(|e| {
            AuthError::NotConfigured(match e {
                CoreError::Config(detail) => detail,
                other => other.to_string(),
            })
        })?;

        let nonce = self.nonces.issue().map_err(AuthError::NonceSetup)?;
        advance(machine, LoginMachineInput::NonceStored)?;

        let authorization_url = self.authorization_url(&nonce)?;
        advance(machine, LoginMachineInput::RedirectLaunched)?;

        let redirect_url = match self.redirect.launch(&authorization_url).await {
            Ok(Some(url)) => url,
            Ok(None) => return Err(AuthError::FlowCancelledOrFailed("Cancelled".to_string())),
            Err(AuthError::FlowCancelledOrFailed(detail)) => {
                return Err(AuthError::FlowCancelledOrFailed(detail))
            }
            Err(e) => return Err(AuthError::FlowCancelledOrFailed(e.to_string())),
        };
        advance(machine, LoginMachineInput::CallbackReturned)?;

        let params = CallbackParams::from_redirect_url(&redirect_url);

        // An error response carries no tokens to verify.
        if params.access_token.is_none() {
            if let Some(provider_error) = &params.error {
                return Err(AuthError::TokenMissing(provider_error.clone()));
            }
        }

        let id_token = self.verify_nonce(&params)?;
        advance(machine, LoginMachineInput::NonceMatched)?;

        let Some(access_token) = params.access_token.as_deref() else {
            return Err(AuthError::TokenMissing(
                params.error.clone().unwrap_or_else(|| "Token missing".to_string()),
            ));
        };

        let token_expiry_time = params.expiry_from(now_ms());
        self.oracle
            .record_login(access_token, id_token, token_expiry_time)?;
        advance(machine, LoginMachineInput::TokensStored)?;
        advance(machine, LoginMachineInput::Complete)?;

        Ok(LoginSuccess {
            token_expiry_time,
            nonce_cleared: true,
        })
    }

    /// Check the identity token's nonce claim against the stored nonce.
    fn verify_nonce<'a>(&self, params: &'a CallbackParams) -> AuthResult<&'a str> {
        let Some(stored) = self.nonces.peek()? else {
            error!("Stored nonce not found, cannot verify identity token");
            return Err(AuthError::NonceVerification(NonceFailure::SetupMissing));
        };

        let Some(id_token) = params.id_token.as_deref() else {
            warn!("Identity token missing from redirect");
            return Err(AuthError::NonceVerification(NonceFailure::IdTokenMissing));
        };

        let claim = nonce_claim(id_token).map_err(|e| {
            warn!(error = %e, "Failed to decode identity token");
            AuthError::NonceVerification(NonceFailure::Parse(e.to_string()))
        })?;

        match claim {
            None => Err(AuthError::NonceVerification(NonceFailure::MissingClaim)),
            Some(claim) if claim != stored => {
                error!("Nonce mismatch between identity token and stored nonce");
                Err(AuthError::NonceVerification(NonceFailure::Mismatch))
            }
            Some(_) => {
                debug!("Nonce verified");
                Ok(id_token)
            }
        }
    }
}

fn advance(machine: &mut LoginMachine, input: LoginMachineInput) -> AuthResult<LoginPhase> {
    machine.consume(&input).map_err(|_| {
        AuthError::InvalidStateTransition(format!(
            "Cannot apply {:?} in state {:?}",
            input,
            machine.state()
        ))
    })?;
    let phase = LoginPhase::from(machine.state());
    debug!(phase = ?phase, "Login state transition");
    Ok(phase)
}
