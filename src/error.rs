//! Error taxonomy for the session tracker.
//!
//! Every variant is recoverable at the interaction level; none of them is
//! meant to tear the process down.

use thiserror::Error;

/// A close (or activity append) was refused because the accumulated
/// activities are incomplete. Positions are 1-based, as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one activity must be registered before ending the session")]
    NoActivities,

    #[error("activity {index} is missing a title")]
    MissingTitle { index: usize },

    #[error("activity {index} is missing a description")]
    MissingDescription { index: usize },

    #[error("activity {index} must carry at least one evidence file")]
    MissingEvidence { index: usize },
}

/// Failure talking to the record store: network error or non-2xx reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Used when the server gave no readable message.
    pub fn fallback(status: Option<u16>) -> Self {
        let message = match status {
            Some(code) => format!("record store request failed with status {code}"),
            None => "record store request failed".to_string(),
        };
        Self { status, message }
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no signed-in user: an identity and bearer token are required")]
    MissingAuth,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("a session is already open")]
    SessionAlreadyOpen,

    #[error("no open session")]
    NoOpenSession,

    #[error("the session is already being submitted")]
    SubmissionInFlight,

    #[error("the open session was started by another user")]
    SessionOwnerMismatch,

    #[error("response discarded: the signed-in user changed while it was in flight")]
    StaleResponse,
}

impl TrackerError {
    /// True when retrying the same action later may succeed without user edits.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::Transport(_) | TrackerError::SubmissionInFlight
        )
    }
}

pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
