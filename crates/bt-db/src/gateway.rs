//! `EventGateway` backed by a local SQLite database.

use std::future::{Future, ready};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bt_core::{BabyId, Event, EventDraft, EventFilter, EventGateway, EventId, GatewayError, assign_id};

use crate::{Database, DbError, EventQuery, EventRecord, format_timestamp};

impl From<DbError> for GatewayError {
    fn from(err: DbError) -> Self {
        Self::backend(err.to_string())
    }
}

/// Gateway that stores events in a single SQLite file.
///
/// Calls complete synchronously; the returned futures are already resolved.
pub struct SqliteGateway {
    db: Mutex<Database>,
}

impl SqliteGateway {
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, draft: EventDraft) -> Result<Event, GatewayError> {
        let event = assign_id(draft);
        let record = EventRecord::from_event(&event)?;
        self.db().insert_event(&record)?;
        tracing::debug!(event_id = %event.id, kind = %record.kind, "event inserted");
        Ok(event)
    }

    fn update(&self, event: &Event) -> Result<(), GatewayError> {
        let record = EventRecord::from_event(event)?;
        if !self.db().update_event(&record)? {
            return Err(GatewayError::NotFound {
                id: event.id.clone(),
            });
        }
        Ok(())
    }

    fn delete(&self, id: &EventId) -> Result<(), GatewayError> {
        if !self.db().delete_event(id.as_str())? {
            return Err(GatewayError::NotFound { id: id.clone() });
        }
        Ok(())
    }

    fn fetch(&self, id: &EventId) -> Result<Option<Event>, GatewayError> {
        let record = self.db().get_event(id.as_str())?;
        Ok(record.map(EventRecord::into_event).transpose()?)
    }

    fn query(&self, baby_id: &BabyId, filter: &EventFilter) -> Result<Vec<Event>, GatewayError> {
        let since = filter.since.map(format_timestamp);
        let query = EventQuery {
            kind: filter.event_type.map(|t| t.as_str()),
            since: since.as_deref(),
            limit: filter.limit,
        };
        let records = self.db().list_events(baby_id.as_str(), query)?;
        let events = records
            .into_iter()
            .map(EventRecord::into_event)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

impl EventGateway for SqliteGateway {
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
        ready(self.fetch(id))
    }

    fn query_events(
        &self,
        baby_id: &BabyId,
        filter: &EventFilter,
    ) -> impl Future<Output = Result<Vec<Event>, GatewayError>> + Send {
        ready(self.query(baby_id, filter))
    }
}
