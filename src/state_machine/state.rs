//! Session state

use serde::{Deserialize, Serialize};

/// Submission state. Gates the single in-flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Ready for user input
    #[default]
    Idle,
    /// A gateway call is in flight
    Sending,
}

impl SessionState {
    pub fn is_sending(self) -> bool {
        self == SessionState::Sending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Sending => "sending",
        }
    }
}
