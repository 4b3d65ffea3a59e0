//! Error taxonomy for session and event operations.

use std::fmt;

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::types::{BabyId, EventId, ValidationError};

/// Which live session an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Nursing,
    Sleep,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nursing => "nursing",
            Self::Sleep => "sleep",
        })
    }
}

/// Why a session command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Nothing is running.
    Idle,
    /// The session is being written to the gateway.
    Saving,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "not running",
            Self::Saving => "still being saved",
        })
    }
}

/// Errors returned by [`SessionStore`](crate::SessionStore) operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A session of this kind is already running.
    #[error("a {kind} session is already in progress")]
    Conflict { kind: SessionKind },

    /// The command needs an active session and there is none.
    #[error("{kind} session is {state}")]
    InvalidState { kind: SessionKind, state: SlotState },

    /// Malformed or out-of-policy input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The gateway failed to persist a change.
    #[error("failed to save event: {0}")]
    Persistence(#[source] GatewayError),

    /// The gateway failed to read stored events.
    #[error("failed to load events: {0}")]
    Unavailable(#[source] GatewayError),

    /// The gateway does not know this event.
    #[error("event not found: {id}")]
    NotFound { id: EventId },

    /// The baby profile is a read-only placeholder.
    #[error("events cannot be logged for demo profile {baby_id}")]
    DemoBaby { baby_id: BabyId },
}

impl From<GatewayError> for TrackerError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound { id } => Self::NotFound { id },
            other @ GatewayError::Backend { .. } => Self::Persistence(other),
        }
    }
}

impl TrackerError {
    /// Maps a gateway error raised while reading.
    #[must_use]
    pub fn from_read(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound { id } => Self::NotFound { id },
            other @ GatewayError::Backend { .. } => Self::Unavailable(other),
        }
    }

    /// Short message suitable for showing to the person using the app.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Conflict { kind: SessionKind::Nursing } => {
                "A nursing session is already running".to_string()
            }
            Self::Conflict { kind: SessionKind::Sleep } => {
                "A sleep session is already running".to_string()
            }
            Self::InvalidState {
                kind,
                state: SlotState::Idle,
            } => format!("No {kind} session is running"),
            Self::InvalidState {
                kind,
                state: SlotState::Saving,
            } => format!("Still saving the {kind} session"),
            Self::Validation(err) => err.to_string(),
            Self::Persistence(_) => "Failed to save. Please try again.".to_string(),
            Self::Unavailable(_) => "Could not load entries. Please try again.".to_string(),
            Self::NotFound { .. } => "That entry no longer exists".to_string(),
            Self::DemoBaby { .. } => "Demo profiles are read-only".to_string(),
        }
    }

    /// Whether repeating the same call might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Unavailable(_))
    }
}
