//! Contract for the durable event store, plus an in-memory implementation.
//!
//! All gateway operations are async and fallible. The session store never
//! assumes a call has succeeded until its future resolves to `Ok`.

use std::future::{Future, ready};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::{Event, EventDraft};
use crate::event_type::EventType;
use crate::types::{BabyId, EventId};

/// Errors reported by an event gateway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// No event with this ID exists.
    #[error("event not found: {id}")]
    NotFound { id: EventId },

    /// The backend failed to complete the request.
    #[error("backend error: {message}")]
    Backend { message: String },
}

impl GatewayError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Optional constraints on an event query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub event_type: Option<EventType>,
    /// Only events at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Whether `event` passes the type and time constraints (ignores `limit`).
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.event_type.is_none_or(|t| event.event_type() == t)
            && self.since.is_none_or(|since| event.timestamp >= since)
    }
}

/// Remote or local store that owns persisted events.
pub trait EventGateway: Send + Sync {
    /// Stores a new event and returns it with its durable ID.
    ///
    /// Uses `draft.id` when present, otherwise assigns one.
    fn create_event(
        &self,
        draft: EventDraft,
    ) -> impl Future<Output = Result<Event, GatewayError>> + Send;

    /// Replaces the stored event with the same ID.
    fn update_event(&self, event: &Event) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn delete_event(&self, id: &EventId) -> impl Future<Output = Result<(), GatewayError>> + Send;

    fn fetch_event(
        &self,
        id: &EventId,
    ) -> impl Future<Output = Result<Option<Event>, GatewayError>> + Send;

    /// Lists a baby's events, newest first.
    fn query_events(
        &self,
        baby_id: &BabyId,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<Vec<Event>, GatewayError>> + Send;
}

/// Assigns the draft's preferred ID, or a fresh UUID when it has none.
#[must_use]
pub fn assign_id(draft: EventDraft) -> Event {
    let id = draft.id.clone().unwrap_or_else(EventId::generate);
    draft.into_event(id)
}

/// Newest first; ties broken by ID so ordering is deterministic.
pub fn sort_newest_first(events: &mut [Event]) {
    events.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.id.as_str().cmp(a.id.as_str()))
    });
}

/// Gateway that keeps events in process memory.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    events: Mutex<Vec<Event>>,
}

impl MemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every stored event in insertion order.
    pub fn events(&self) -> Vec<Event> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, draft: EventDraft) -> Result<Event, GatewayError> {
        let event = assign_id(draft);
        let mut events = self.lock();
        if events.iter().any(|e| e.id == event.id) {
            return Err(GatewayError::backend(format!(
                "duplicate event id: {}",
                event.id
            )));
        }
        events.push(event.clone());
        Ok(event)
    }

    fn update(&self, event: &Event) -> Result<(), GatewayError> {
        let mut events = self.lock();
        let slot = events
            .iter_mut()
            .find(|e| e.id == event.id)
            .ok_or_else(|| GatewayError::NotFound {
                id: event.id.clone(),
            })?;
        *slot = event.clone();
        Ok(())
    }

    fn delete(&self, id: &EventId) -> Result<(), GatewayError> {
        let mut events = self.lock();
        let before = events.len();
        events.retain(|e| &e.id != id);
        if events.len() == before {
            return Err(GatewayError::NotFound { id: id.clone() });
        }
        Ok(())
    }

    fn query(&self, baby_id: &BabyId, filter: &EventFilter) -> Vec<Event> {
        let mut matching: Vec<Event> = self
            .lock()
            .iter()
            .filter(|e| &e.baby_id == baby_id && filter.matches(e))
            .cloned()
            .collect();
        sort_newest_first(&mut matching);
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        matching
    }
}

impl EventGateway for MemoryGateway {
    fn create_event(
        &self,
        draft: EventDraft,
    ) -> impl Future<Output = Result<Event, GatewayError>> + Send {
        ready(self.create(draft))
    }

    fn update_event(&self, event: &Event) -> impl Future<Output = Result<(), GatewayError>> + Send {
        ready(self.update(event))
    }

    fn delete_event(&self, id: &EventId) -> impl Future<Output = Result<(), GatewayError>> + Send {
        ready(self.delete(id))
    }

    fn fetch_event(
        &self,
        id: &EventId,
    ) -> impl Future<Output = Result<Option<Event>, GatewayError>> + Send {
        ready(Ok(self.lock().iter().find(|e| &e.id == id).cloned()))
    }

    fn query_events(
        &self,
        baby_id: &BabyId,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<Vec<Event>, GatewayError>> + Send {
        ready(Ok(self.query(baby_id, filter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPayload;
    use crate::time::parse_timestamp;
    use crate::types::Side;

    fn draft(baby: &str, at: &str, payload: EventPayload) -> EventDraft {
        EventDraft::new(
            BabyId::new(baby).unwrap(),
            parse_timestamp(at).unwrap(),
            payload,
        )
    }

    #[tokio::test]
    async fn create_assigns_id_or_keeps_preferred() {
        let gateway = MemoryGateway::new();
        let generated = gateway
            .create_event(draft("b1", "2025-01-01T00:00:00Z", EventPayload::Diaper))
            .await
            .unwrap();
        assert!(!generated.id.as_str().is_empty());

        let preferred = gateway
            .create_event(
                draft("b1", "2025-01-01T00:00:00Z", EventPayload::Bottle)
                    .with_id(EventId::new("fixed").unwrap()),
            )
            .await
            .unwrap();
        assert_eq!(preferred.id.as_str(), "fixed");
        assert_eq!(gateway.len(), 2);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let gateway = MemoryGateway::new();
        let d = draft("b1", "2025-01-01T00:00:00Z", EventPayload::Diaper)
            .with_id(EventId::new("dup").unwrap());
        gateway.create_event(d.clone()).await.unwrap();
        let err = gateway.create_event(d).await.unwrap_err();
        assert!(matches!(err, GatewayError::Backend { .. }));
    }

    #[tokio::test]
    async fn query_is_newest_first_and_filtered() {
        let gateway = MemoryGateway::new();
        for (at, payload) in [
            ("2025-01-01T01:00:00Z", EventPayload::Diaper),
            ("2025-01-01T03:00:00Z", EventPayload::Nursing { side: Side::Left }),
            ("2025-01-01T02:00:00Z", EventPayload::Nursing { side: Side::Right }),
        ] {
            gateway.create_event(draft("b1", at, payload)).await.unwrap();
        }
        gateway
            .create_event(draft("b2", "2025-01-01T04:00:00Z", EventPayload::Sleep))
            .await
            .unwrap();

        let baby = BabyId::new("b1").unwrap();
        let all = gateway
            .query_events(&baby, &EventFilter::default())
            .await
            .unwrap();
        let times: Vec<String> = all.iter().map(|e| e.timestamp.to_rfc3339()).collect();
        assert_eq!(
            times,
            vec![
                "2025-01-01T03:00:00+00:00",
                "2025-01-01T02:00:00+00:00",
                "2025-01-01T01:00:00+00:00",
            ]
        );

        let nursing = gateway
            .query_events(
                &baby,
                &EventFilter {
                    event_type: Some(EventType::Nursing),
                    since: Some(parse_timestamp("2025-01-01T02:30:00Z").unwrap()),
                    limit: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(nursing.len(), 1);
        assert_eq!(nursing[0].side(), Some(Side::Left));

        let limited = gateway
            .query_events(
                &baby,
                &EventFilter {
                    limit: Some(1),
                    ..EventFilter::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn update_and_delete_unknown_ids_are_not_found() {
        let gateway = MemoryGateway::new();
        let ghost = draft("b1", "2025-01-01T00:00:00Z", EventPayload::Solids)
            .into_event(EventId::new("ghost").unwrap());

        assert!(matches!(
            gateway.update_event(&ghost).await,
            Err(GatewayError::NotFound { .. })
        ));
        assert!(matches!(
            gateway.delete_event(&ghost.id).await,
            Err(GatewayError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn update_replaces_record() {
        let gateway = MemoryGateway::new();
        let mut event = gateway
            .create_event(draft("b1", "2025-01-01T00:00:00Z", EventPayload::Sleep))
            .await
            .unwrap();
        event.duration_secs = Some(600);
        gateway.update_event(&event).await.unwrap();

        let stored = gateway.fetch_event(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.duration_secs, Some(600));
    }
}
