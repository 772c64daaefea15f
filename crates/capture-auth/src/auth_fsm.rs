//! Login flow state machine using rust-fsm.
//!
//! Each login attempt drives a fresh machine from `Idle` to `Succeeded` or
//! `Failed`. Terminal states accept no input.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │      Idle       │ (initial)
//! └────────┬────────┘
//!          │ NonceStored
//!          ▼
//! ┌─────────────────┐
//! │   NonceIssued   │
//! └────────┬────────┘
//!          │ RedirectLaunched
//!          ▼
//! ┌─────────────────┐
//! │   Redirected    │
//! └────────┬────────┘
//!          │ CallbackReturned
//!          ▼
//! ┌──────────────────┐
//! │ CallbackReceived │
//! └────────┬─────────┘
//!          │ NonceMatched
//!          ▼
//! ┌─────────────────┐
//! │  NonceVerified  │
//! └────────┬────────┘
//!          │ TokensStored
//!          ▼
//! ┌─────────────────┐
//! │ TokenPersisted  │
//! └────────┬────────┘
//!          │ Complete
//!          ▼
//!      Succeeded
//!
//! Any non-terminal state ── Abort ──► Failed
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub login_machine(Idle)

    Idle => {
        NonceStored => NonceIssued,
        Abort => Failed
    },
    NonceIssued => {
        RedirectLaunched => Redirected,
        Abort => Failed
    },
    Redirected => {
        CallbackReturned => CallbackReceived,
        Abort => Failed
    },
    CallbackReceived => {
        NonceMatched => NonceVerified,
        Abort => Failed
    },
    NonceVerified => {
        TokensStored => TokenPersisted,
        Abort => Failed
    },
    TokenPersisted => {
        Complete => Succeeded,
        Abort => Failed
    }
}

pub use login_machine::Input as LoginMachineInput;
pub use login_machine::State as LoginMachineState;
pub use login_machine::StateMachine as LoginMachine;

/// Login progress for logs and status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginPhase {
    Idle,
    NonceIssued,
    Redirected,
    CallbackReceived,
    NonceVerified,
    TokenPersisted,
    Succeeded,
    Failed,
}

impl From<&LoginMachineState> for LoginPhase {
    fn from(state: &LoginMachineState) -> Self {
        match state {
            LoginMachineState::Idle => LoginPhase::Idle,
            LoginMachineState::NonceIssued => LoginPhase::NonceIssued,
            LoginMachineState::Redirected => LoginPhase::Redirected,
            LoginMachineState::CallbackReceived => LoginPhase::CallbackReceived,
            LoginMachineState::NonceVerified => LoginPhase::NonceVerified,
            LoginMachineState::TokenPersisted => LoginPhase::TokenPersisted,
            LoginMachineState::Succeeded => LoginPhase::Succeeded,
            LoginMachineState::Failed => LoginPhase::Failed,
        }
    }
}
