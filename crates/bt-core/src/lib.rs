//! Core domain logic for the baby tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Events: durable records of nursing, sleep, diapers and feeds
//! - Live sessions: the single running nursing and sleep session
//! - Gateways: the async contract for storing events
//! - Live status: best-effort mirroring of a running nursing session

mod broadcast;
pub mod duration;
mod error;
mod event;
pub mod event_type;
mod gateway;
mod session;
mod store;
pub mod time;
pub mod types;

pub use broadcast::{BroadcastError, LiveStatusBroadcaster, LogBroadcaster, NoopBroadcaster};
pub use error::{SessionKind, SlotState, TrackerError};
pub use event::{Event, EventDraft, EventPayload, normalize_notes};
pub use event_type::{EventType, UnknownEventType};
pub use gateway::{
    EventFilter, EventGateway, GatewayError, MemoryGateway, assign_id, sort_newest_first,
};
pub use session::{ActiveNursingSession, ActiveSleepSession};
pub use store::{DEMO_BABY_ID, DEMO_BABY_PREFIX, PumpingEntry, SessionStore};
pub use time::{Clock, ManualClock, SystemClock, ensure_storable, parse_timestamp};
pub use types::{BabyId, EventId, PumpingSide, SessionId, Side, ValidationError};
