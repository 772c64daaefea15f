//! Authentication and session core for the Ah-Ha! capture client.
//!
//! This crate provides:
//! - OAuth2 implicit-flow login with nonce verification
//! - Two-tier session state (in-process cache over durable storage)
//! - A loopback redirect listener for browser-based login
//! - Authorized snippet requests with session invalidation on rejection
//! - Explicit FSM-based login progress tracking

mod auth_fsm;
mod capture;
mod error;
mod flow;
mod gateway;
mod id_token;
mod redirect;
mod runtime;
mod session;

pub use auth_fsm::login_machine;
pub use auth_fsm::{LoginMachine, LoginMachineInput, LoginMachineState, LoginPhase};
pub use capture::{default_title, CapturedSelection, ContentType, SnippetPayload};
pub use error::{AuthError, AuthResult, NonceFailure};
pub use flow::{
    AuthFlowController, CallbackParams, LoginReport, LoginSuccess, LOGIN_SUCCESS_STATUS,
    NONCE_CLEAR_WARNING, RESPONSE_TYPE,
};
pub use gateway::{ConnectivityProbe, SnippetGateway};
pub use id_token::{decode_claims, nonce_claim, IdTokenError};
pub use redirect::{InteractiveRedirect, LoopbackRedirect, DEFAULT_REDIRECT_TIMEOUT_SECS};
pub use runtime::{CaptureAuthRuntime, LOGOUT_FAILURE_STATUS, LOGOUT_SUCCESS_STATUS};
pub use session::{now_ms, AuthSnapshot, CachedSession, SessionCache, SessionOracle};
