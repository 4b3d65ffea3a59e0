//! Durable baby-care events and the drafts they are created from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_type::EventType;
use crate::types::{BabyId, EventId, PumpingSide, Side};

/// Type-specific event fields.
///
/// Each variant carries only the fields that make sense for its type, so a
/// sleep event can never hold a nursing side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Nursing {
        side: Side,
    },
    Sleep,
    Diaper,
    Pumping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pumping_side: Option<PumpingSide>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        milliliters: Option<u32>,
    },
    Bottle,
    Solids,
}

impl EventPayload {
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Nursing { .. } => EventType::Nursing,
            Self::Sleep => EventType::Sleep,
            Self::Diaper => EventType::Diaper,
            Self::Pumping { .. } => EventType::Pumping,
            Self::Bottle => EventType::Bottle,
            Self::Solids => EventType::Solids,
        }
    }

    /// Builds the payload for `event_type`, attaching `side` where the type has one.
    ///
    /// Nursing without a side defaults to left. The side is ignored for
    /// types that do not record one.
    #[must_use]
    pub fn for_type(event_type: EventType, side: Option<Side>) -> Self {
        match event_type {
            EventType::Nursing => Self::Nursing {
                side: side.unwrap_or(Side::Left),
            },
            EventType::Sleep => Self::Sleep,
            EventType::Diaper => Self::Diaper,
            EventType::Pumping => Self::Pumping {
                pumping_side: side.map(|s| match s {
                    Side::Left => PumpingSide::Left,
                    Side::Right => PumpingSide::Right,
                }),
                milliliters: None,
            },
            EventType::Bottle => Self::Bottle,
            EventType::Solids => Self::Solids,
        }
    }
}

/// An event as handed to a gateway for creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Preferred ID. Gateways assign one when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,
    pub baby_id: BabyId,
    /// When the activity started.
    pub timestamp: DateTime<Utc>,
    /// Length of the activity in whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventDraft {
    #[must_use]
    pub const fn new(baby_id: BabyId, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            id: None,
            baby_id,
            timestamp,
            duration_secs: None,
            notes: None,
            payload,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, duration_secs: Option<u64>) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = normalize_notes(notes);
        self
    }

    /// Converts the draft into a stored event with the given ID.
    #[must_use]
    pub fn into_event(self, id: EventId) -> Event {
        Event {
            id,
            baby_id: self.baby_id,
            timestamp: self.timestamp,
            duration_secs: self.duration_secs,
            notes: self.notes,
            payload: self.payload,
        }
    }
}

/// A durable record of a completed or instantaneous activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub baby_id: BabyId,
    /// When the activity started (not when it ended).
    pub timestamp: DateTime<Utc>,
    /// Length of the activity in whole seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// The nursing side, for nursing events.
    #[must_use]
    pub const fn side(&self) -> Option<Side> {
        match self.payload {
            EventPayload::Nursing { side } => Some(side),
            _ => None,
        }
    }
}

/// Trims notes and drops them entirely when nothing is left.
#[must_use]
pub fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes.and_then(|n| {
        let trimmed = n.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == n.len() {
            Some(n)
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn nursing_event_serializes_flat_with_type_tag() {
        let event = EventDraft::new(
            BabyId::new("b1").unwrap(),
            ts("2025-01-01T08:00:00Z"),
            EventPayload::Nursing { side: Side::Right },
        )
        .with_duration(Some(420))
        .with_notes(Some("ok".into()))
        .into_event(EventId::new("e1").unwrap());

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "nursing");
        assert_eq!(json["side"], "right");
        assert_eq!(json["duration_secs"], 420);
        assert_eq!(json["notes"], "ok");
        assert_eq!(json["baby_id"], "b1");

        let parsed: Event = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn sleep_payload_rejects_missing_nursing_side() {
        let json = r#"{
            "id": "e1",
            "baby_id": "b1",
            "timestamp": "2025-01-01T00:00:00Z",
            "type": "nursing"
        }"#;
        let result: Result<Event, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn instantaneous_event_omits_duration() {
        let json = r#"{
            "id": "e2",
            "baby_id": "b1",
            "timestamp": "2025-01-01T00:00:00Z",
            "type": "diaper"
        }"#;
        let event: Event = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type(), EventType::Diaper);
        assert_eq!(event.duration_secs, None);
        assert_eq!(event.side(), None);
    }

    #[test]
    fn event_rejects_invalid_timestamp() {
        let json = r#"{
            "id": "e3",
            "baby_id": "b1",
            "timestamp": "not-a-date",
            "type": "bottle"
        }"#;
        let result: Result<Event, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn payload_for_type_maps_side() {
        assert_eq!(
            EventPayload::for_type(EventType::Nursing, Some(Side::Right)),
            EventPayload::Nursing { side: Side::Right }
        );
        assert_eq!(
            EventPayload::for_type(EventType::Sleep, Some(Side::Right)),
            EventPayload::Sleep
        );
        assert_eq!(
            EventPayload::for_type(EventType::Pumping, Some(Side::Left)),
            EventPayload::Pumping {
                pumping_side: Some(PumpingSide::Left),
                milliliters: None,
            }
        );
    }

    #[test]
    fn notes_are_trimmed_and_blank_dropped() {
        assert_eq!(normalize_notes(Some("   ".into())), None);
        assert_eq!(normalize_notes(Some(" fussy ".into())), Some("fussy".into()));
        assert_eq!(normalize_notes(Some("ok".into())), Some("ok".into()));
        assert_eq!(normalize_notes(None), None);
    }
}
