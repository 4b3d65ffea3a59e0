//! Event type enum as the single source of truth for event type strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kinds of baby-care activity that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Nursing,
    Sleep,
    Diaper,
    Pumping,
    Bottle,
    Solids,
}

impl EventType {
    /// All event types, in display order.
    pub const ALL: [Self; 6] = [
        Self::Nursing,
        Self::Sleep,
        Self::Diaper,
        Self::Pumping,
        Self::Bottle,
        Self::Solids,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nursing => "nursing",
            Self::Sleep => "sleep",
            Self::Diaper => "diaper",
            Self::Pumping => "pumping",
            Self::Bottle => "bottle",
            Self::Solids => "solids",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nursing" | "feeding" => Ok(Self::Nursing),
            "sleep" => Ok(Self::Sleep),
            "diaper" => Ok(Self::Diaper),
            "pumping" => Ok(Self::Pumping),
            "bottle" => Ok(Self::Bottle),
            "solids" => Ok(Self::Solids),
            _ => Err(UnknownEventType(s.to_string())),
        }
    }
}

impl Serialize for EventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event type strings.
#[derive(Debug, Clone)]
pub struct UnknownEventType(String);

impl fmt::Display for UnknownEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event type: {}", self.0)
    }
}

impl std::error::Error for UnknownEventType {}
