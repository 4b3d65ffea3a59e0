//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum distance into the past a sleep start time may be placed.
pub const MAX_SLEEP_BACKDATE_HOURS: i64 = 12;

/// Maximum distance into the future a wake timer may be armed.
pub const MAX_WAKE_TIMER_HOURS: i64 = 24;

/// Validation errors for core types and user-supplied input.
///
/// Display strings are short enough to show to a user directly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A timestamp could not be parsed or is outside the representable range.
    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },

    /// Invalid side value.
    #[error("invalid side: {value}")]
    InvalidSide { value: String },

    /// A start time was placed after the current time.
    #[error("Start time cannot be in the future")]
    StartTimeInFuture,

    /// A start time was placed too far in the past.
    #[error("Start time cannot be more than {max_hours} hours ago")]
    StartTimeTooOld { max_hours: i64 },

    /// An interval ended at or before its start.
    #[error("End time must be after start time")]
    EndNotAfterStart,

    /// A wake timer was armed for a time that has already passed.
    #[error("Wake time must be in the future")]
    WakeTimeNotInFuture,

    /// A wake timer was armed too far ahead.
    #[error("Wake time cannot be more than {max_hours} hours away")]
    WakeTimeTooFar { max_hours: i64 },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated event identifier.
    ///
    /// Event IDs must be non-empty strings. Uniqueness is enforced by the
    /// gateway that stores the event.
    EventId, "event ID"
);

define_string_id!(
    /// A validated baby profile identifier.
    BabyId, "baby ID"
);

define_string_id!(
    /// A validated live session identifier.
    ///
    /// The session ID becomes the ID of the event the session is finalized into.
    SessionId, "session ID"
);

impl EventId {
    /// Generates a fresh random event ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl SessionId {
    /// Generates a fresh random session ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl From<SessionId> for EventId {
    fn from(id: SessionId) -> Self {
        Self(id.0)
    }
}

/// Feeding side for a nursing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// String representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// The other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            _ => Err(ValidationError::InvalidSide {
                value: s.to_string(),
            }),
        }
    }
}

/// Breast pumped during a pumping session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PumpingSide {
    Left,
    Right,
    Both,
}

impl PumpingSide {
    /// String representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for PumpingSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PumpingSide {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" | "l" => Ok(Self::Left),
            "right" | "r" => Ok(Self::Right),
            "both" | "b" => Ok(Self::Both),
            _ => Err(ValidationError::InvalidSide {
                value: s.to_string(),
            }),
        }
    }
}
