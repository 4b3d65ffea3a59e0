//! The session state store.
//!
//! [`SessionStore`] is the single owner of "is a nursing or sleep session
//! running". It holds at most one live session of each kind for the whole
//! process, regardless of which baby the session belongs to, and is the only
//! component that turns a live session into a persisted [`Event`].
//!
//! # Concurrency
//!
//! Both slots live behind one mutex, so every check-and-set (start, switch,
//! cancel, adjust) is atomic. Stopping a session is a two-phase operation:
//! the slot moves to a saving state under the lock, the gateway call runs
//! without the lock held, and the slot is cleared only once the gateway
//! confirms the write. If the write fails, or the stop future is dropped
//! before it resolves, the session goes back to active untouched.
//!
//! Elapsed time is always derived from the stored start time and the
//! injected [`Clock`], never from accumulated ticks.

use std::collections::HashSet;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

use crate::broadcast::{BroadcastError, LiveStatusBroadcaster, NoopBroadcaster};
use crate::duration::format_duration;
use crate::error::{SessionKind, SlotState, TrackerError};
use crate::event::{Event, EventDraft, EventPayload};
use crate::gateway::{EventFilter, EventGateway};
use crate::session::{ActiveNursingSession, ActiveSleepSession};
use crate::time::{Clock, SystemClock, elapsed_seconds, ensure_storable};
use crate::types::{
    BabyId, EventId, MAX_SLEEP_BACKDATE_HOURS, MAX_WAKE_TIMER_HOURS, PumpingSide, SessionId, Side,
    ValidationError,
};

/// Baby ID used by the demo profile.
pub const DEMO_BABY_ID: &str = "demo";

/// Any baby ID with this prefix is treated as a demo placeholder.
pub const DEMO_BABY_PREFIX: &str = "demo-";

/// Optional fields for a manually logged pumping session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PumpingEntry {
    /// Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    pub duration_secs: Option<u64>,
    pub notes: Option<String>,
    pub side: Option<PumpingSide>,
    pub milliliters: Option<u32>,
}

enum Slot<S> {
    Idle,
    Active(S),
    Saving(S),
}

impl<S: Clone> Slot<S> {
    const fn is_occupied(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    const fn session(&self) -> Option<&S> {
        match self {
            Self::Active(s) | Self::Saving(s) => Some(s),
            Self::Idle => None,
        }
    }

    const fn session_mut(&mut self) -> Option<&mut S> {
        match self {
            Self::Active(s) | Self::Saving(s) => Some(s),
            Self::Idle => None,
        }
    }

    const fn refusal(&self, kind: SessionKind) -> TrackerError {
        let state = match self {
            Self::Saving(_) => SlotState::Saving,
            Self::Idle | Self::Active(_) => SlotState::Idle,
        };
        TrackerError::InvalidState { kind, state }
    }

    fn active_mut(&mut self, kind: SessionKind) -> Result<&mut S, TrackerError> {
        match self {
            Self::Active(s) => Ok(s),
            other => Err(other.refusal(kind)),
        }
    }

    fn ensure_vacant(&self, kind: SessionKind) -> Result<(), TrackerError> {
        if self.is_occupied() {
            return Err(TrackerError::Conflict { kind });
        }
        Ok(())
    }

    /// Removes the active session, leaving the slot idle.
    fn take_active(&mut self, kind: SessionKind) -> Result<S, TrackerError> {
        match mem::replace(self, Self::Idle) {
            Self::Active(s) => Ok(s),
            other => {
                let err = other.refusal(kind);
                *self = other;
                Err(err)
            }
        }
    }

    /// Marks the active session as being saved and returns a copy of it.
    fn begin_save(&mut self, kind: SessionKind) -> Result<S, TrackerError> {
        let session = self.active_mut(kind)?.clone();
        *self = Self::Saving(session.clone());
        Ok(session)
    }

    fn revert_save(&mut self) {
        if let Self::Saving(s) = mem::replace(self, Self::Idle) {
            *self = Self::Active(s);
        }
    }

    fn finish_save(&mut self) {
        if matches!(self, Self::Saving(_)) {
            *self = Self::Idle;
        }
    }
}

struct TrackerState {
    nursing: Slot<ActiveNursingSession>,
    sleep: Slot<ActiveSleepSession>,
    last_created: Option<Event>,
}

impl TrackerState {
    const fn new() -> Self {
        Self {
            nursing: Slot::Idle,
            sleep: Slot::Idle,
            last_created: None,
        }
    }

    fn revert_save(&mut self, kind: SessionKind) {
        match kind {
            SessionKind::Nursing => self.nursing.revert_save(),
            SessionKind::Sleep => self.sleep.revert_save(),
        }
    }

    fn finish_save(&mut self, kind: SessionKind, event: &Event) {
        match kind {
            SessionKind::Nursing => self.nursing.finish_save(),
            SessionKind::Sleep => self.sleep.finish_save(),
        }
        self.last_created = Some(event.clone());
    }
}

fn lock(state: &Mutex<TrackerState>) -> MutexGuard<'_, TrackerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Puts a saving session back to active unless the save completed.
struct PendingSave<'a> {
    state: &'a Mutex<TrackerState>,
    kind: SessionKind,
    completed: bool,
}

impl<'a> PendingSave<'a> {
    const fn new(state: &'a Mutex<TrackerState>, kind: SessionKind) -> Self {
        Self {
            state,
            kind,
            completed: false,
        }
    }

    fn complete(mut self, event: &Event) {
        lock(self.state).finish_save(self.kind, event);
        self.completed = true;
    }
}

impl Drop for PendingSave<'_> {
    fn drop(&mut self) {
        if !self.completed {
            lock(self.state).revert_save(self.kind);
        }
    }
}

fn log_broadcast_failure(action: &'static str, result: Result<(), BroadcastError>) {
    if let Err(err) = result {
        tracing::warn!(error = %err, action, "live status update failed");
    }
}

/// A sleep start must lie within the last twelve hours, inclusive.
fn validate_sleep_start(
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if start > now {
        return Err(ValidationError::StartTimeInFuture);
    }
    if now - start > Duration::hours(MAX_SLEEP_BACKDATE_HOURS) {
        return Err(ValidationError::StartTimeTooOld {
            max_hours: MAX_SLEEP_BACKDATE_HOURS,
        });
    }
    Ok(())
}

fn validate_wake_time(wake: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationError> {
    if wake <= now {
        return Err(ValidationError::WakeTimeNotInFuture);
    }
    if wake - now > Duration::hours(MAX_WAKE_TIMER_HOURS) {
        return Err(ValidationError::WakeTimeTooFar {
            max_hours: MAX_WAKE_TIMER_HOURS,
        });
    }
    Ok(())
}

/// Live session tracker with an injected gateway, broadcaster and clock.
pub struct SessionStore<G, B = NoopBroadcaster, C = SystemClock> {
    gateway: G,
    broadcaster: B,
    clock: C,
    demo_babies: HashSet<BabyId>,
    state: Mutex<TrackerState>,
}

impl<G: EventGateway> SessionStore<G> {
    /// Store with no live-status mirroring and the system clock.
    pub fn with_gateway(gateway: G) -> Self {
        Self::new(gateway, NoopBroadcaster, SystemClock)
    }
}

impl<G, B, C> SessionStore<G, B, C>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
{
    pub fn new(gateway: G, broadcaster: B, clock: C) -> Self {
        Self {
            gateway,
            broadcaster,
            clock,
            demo_babies: HashSet::new(),
            state: Mutex::new(TrackerState::new()),
        }
    }

    /// Registers additional baby IDs that must never be written.
    #[must_use]
    pub fn with_demo_babies(mut self, ids: impl IntoIterator<Item = BabyId>) -> Self {
        self.demo_babies.extend(ids);
        self
    }

    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    pub const fn broadcaster(&self) -> &B {
        &self.broadcaster
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    fn state(&self) -> MutexGuard<'_, TrackerState> {
        lock(&self.state)
    }

    /// Whether data for this baby may be persisted.
    pub fn can_log_events(&self, baby_id: &BabyId) -> bool {
        let id = baby_id.as_str();
        !(id == DEMO_BABY_ID || id.starts_with(DEMO_BABY_PREFIX) || self.demo_babies.contains(baby_id))
    }

    fn ensure_loggable(&self, baby_id: &BabyId) -> Result<(), TrackerError> {
        if self.can_log_events(baby_id) {
            Ok(())
        } else {
            tracing::debug!(%baby_id, "refusing write for demo profile");
            Err(TrackerError::DemoBaby {
                baby_id: baby_id.clone(),
            })
        }
    }

    // ========== Nursing ==========

    /// Starts the process-wide nursing session.
    pub fn start_nursing_session(
        &self,
        baby_id: BabyId,
        side: Side,
    ) -> Result<SessionId, TrackerError> {
        self.ensure_loggable(&baby_id)?;
        let session = {
            let mut state = self.state();
            state.nursing.ensure_vacant(SessionKind::Nursing)?;
            let session = ActiveNursingSession {
                session_id: SessionId::generate(),
                baby_id,
                side,
                start_time: self.clock.now(),
            };
            state.nursing = Slot::Active(session.clone());
            session
        };

        tracing::debug!(
            session_id = %session.session_id,
            baby_id = %session.baby_id,
            %side,
            "nursing session started"
        );
        log_broadcast_failure(
            "start",
            self.broadcaster
                .announce_start(side, session.baby_id.as_str()),
        );
        Ok(session.session_id)
    }

    /// Changes the side of the running session without restarting its timer.
    pub fn switch_nursing_side(&self, new_side: Side) -> Result<(), TrackerError> {
        {
            let mut state = self.state();
            let session = state.nursing.active_mut(SessionKind::Nursing)?;
            session.side = new_side;
        }
        tracing::debug!(side = %new_side, "nursing side switched");
        log_broadcast_failure(
            "side change",
            self.broadcaster.announce_side_change(new_side),
        );
        Ok(())
    }

    /// Persists the running session as a nursing event and clears it.
    ///
    /// The recorded side is `side_override` when given, otherwise the side in
    /// effect now. On a gateway failure the session stays active.
    pub async fn stop_nursing_session(
        &self,
        notes: Option<String>,
        side_override: Option<Side>,
    ) -> Result<Event, TrackerError> {
        let now = self.clock.now();
        let session = self.state().nursing.begin_save(SessionKind::Nursing)?;
        let pending = PendingSave::new(&self.state, SessionKind::Nursing);

        let draft = session.finalize(now, notes, side_override);
        let event = match self.gateway.create_event(draft).await {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    error = %err,
                    "failed to save nursing session; keeping it active"
                );
                return Err(err.into());
            }
        };
        pending.complete(&event);

        tracing::info!(
            event_id = %event.id,
            duration_secs = ?event.duration_secs,
            "nursing session saved"
        );
        log_broadcast_failure("stop", self.broadcaster.announce_stop());
        Ok(event)
    }

    /// Discards the running session without saving anything.
    pub fn cancel_nursing_session(&self) -> Result<(), TrackerError> {
        let session = self.state().nursing.take_active(SessionKind::Nursing)?;
        tracing::debug!(session_id = %session.session_id, "nursing session cancelled");
        log_broadcast_failure("stop", self.broadcaster.announce_stop());
        Ok(())
    }

    pub fn is_nursing_in_progress(&self) -> bool {
        self.state().nursing.is_occupied()
    }

    pub fn active_nursing_session(&self) -> Option<ActiveNursingSession> {
        self.state().nursing.session().cloned()
    }

    /// Seconds since the nursing session started, or zero when idle.
    pub fn nursing_elapsed_seconds(&self) -> u64 {
        let now = self.clock.now();
        self.state()
            .nursing
            .session()
            .map_or(0, |s| s.elapsed_seconds(now))
    }

    pub fn nursing_elapsed_display(&self) -> String {
        format_duration(self.nursing_elapsed_seconds())
    }

    // ========== Sleep ==========

    /// Starts the process-wide sleep session, optionally backdated.
    pub fn start_sleep_session(
        &self,
        baby_id: BabyId,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<SessionId, TrackerError> {
        self.ensure_loggable(&baby_id)?;
        let now = self.clock.now();
        let start_time = match start_time {
            Some(start) => {
                validate_sleep_start(start, now)?;
                start
            }
            None => now,
        };

        let session_id = {
            let mut state = self.state();
            state.sleep.ensure_vacant(SessionKind::Sleep)?;
            let session = ActiveSleepSession {
                session_id: SessionId::generate(),
                baby_id,
                start_time,
                wake_timer_set_for: None,
                wake_timer_triggered: false,
            };
            let id = session.session_id.clone();
            state.sleep = Slot::Active(session);
            id
        };

        tracing::debug!(%session_id, %start_time, "sleep session started");
        Ok(session_id)
    }

    /// Moves the start of the running sleep session.
    ///
    /// The new start may be at most twelve hours ago and not in the future.
    /// An armed wake timer is left as is.
    pub fn adjust_sleep_start_time(&self, new_start: DateTime<Utc>) -> Result<(), TrackerError> {
        let now = self.clock.now();
        let mut state = self.state();
        let session = state.sleep.active_mut(SessionKind::Sleep)?;
        validate_sleep_start(new_start, now)?;
        session.start_time = new_start;
        tracing::debug!(start_time = %new_start, "sleep start adjusted");
        Ok(())
    }

    /// Arms the wake alarm for the running sleep session.
    ///
    /// `wake_time` must be in the future and within twenty-four hours.
    pub fn set_wake_timer(&self, wake_time: DateTime<Utc>) -> Result<(), TrackerError> {
        let now = self.clock.now();
        let mut state = self.state();
        let session = state.sleep.active_mut(SessionKind::Sleep)?;
        validate_wake_time(wake_time, now)?;
        session.arm_wake_timer(wake_time);
        tracing::debug!(%wake_time, "wake timer set");
        Ok(())
    }

    pub fn cancel_wake_timer(&self) -> Result<(), TrackerError> {
        let mut state = self.state();
        state
            .sleep
            .active_mut(SessionKind::Sleep)?
            .clear_wake_timer();
        tracing::debug!("wake timer cancelled");
        Ok(())
    }

    /// Whether the wake alarm has gone off.
    ///
    /// Once observed as triggered it stays triggered until the timer is
    /// cancelled or re-armed, or a new sleep session starts.
    pub fn is_wake_timer_triggered(&self) -> bool {
        let now = self.clock.now();
        self.state()
            .sleep
            .session_mut()
            .is_some_and(|s| s.poll_wake_timer(now))
    }

    /// Seconds until the wake alarm, if one is armed.
    pub fn wake_timer_remaining_seconds(&self) -> Option<u64> {
        let now = self.clock.now();
        self.state()
            .sleep
            .session()
            .and_then(|s| s.wake_timer_remaining(now))
    }

    /// Persists the running session as a sleep event and clears it.
    ///
    /// On a gateway failure the session stays active.
    pub async fn stop_sleep_session(&self, notes: Option<String>) -> Result<Event, TrackerError> {
        let now = self.clock.now();
        let session = self.state().sleep.begin_save(SessionKind::Sleep)?;
        let pending = PendingSave::new(&self.state, SessionKind::Sleep);

        let draft = session.finalize(now, notes);
        let event = match self.gateway.create_event(draft).await {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(
                    session_id = %session.session_id,
                    error = %err,
                    "failed to save sleep session; keeping it active"
                );
                return Err(err.into());
            }
        };
        pending.complete(&event);

        tracing::info!(
            event_id = %event.id,
            duration_secs = ?event.duration_secs,
            "sleep session saved"
        );
        Ok(event)
    }

    pub fn cancel_sleep_session(&self) -> Result<(), TrackerError> {
        let session = self.state().sleep.take_active(SessionKind::Sleep)?;
        tracing::debug!(session_id = %session.session_id, "sleep session cancelled");
        Ok(())
    }

    pub fn is_sleep_in_progress(&self) -> bool {
        self.state().sleep.is_occupied()
    }

    pub fn sleep_session(&self) -> Option<ActiveSleepSession> {
        self.state().sleep.session().cloned()
    }

    pub fn sleep_elapsed_seconds(&self) -> u64 {
        let now = self.clock.now();
        self.state()
            .sleep
            .session()
            .map_or(0, |s| s.elapsed_seconds(now))
    }

    pub fn sleep_elapsed_display(&self) -> String {
        format_duration(self.sleep_elapsed_seconds())
    }

    // ========== Manual entry ==========

    /// Logs an event directly, without a live session.
    ///
    /// `timestamp` defaults to now. Timestamps that cannot be stored are
    /// rejected before the gateway is contacted.
    pub async fn add_manual_event(
        &self,
        baby_id: BabyId,
        payload: EventPayload,
        timestamp: Option<DateTime<Utc>>,
        duration_secs: Option<u64>,
        notes: Option<String>,
    ) -> Result<Event, TrackerError> {
        self.ensure_loggable(&baby_id)?;
        let timestamp = ensure_storable(timestamp.unwrap_or_else(|| self.clock.now()))?;
        let draft = EventDraft::new(baby_id, timestamp, payload)
            .with_duration(duration_secs)
            .with_notes(notes);
        self.create(draft).await
    }

    /// Logs a completed sleep from its start and end.
    pub async fn add_sleep_event(
        &self,
        baby_id: BabyId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<Event, TrackerError> {
        if end <= start {
            return Err(ValidationError::EndNotAfterStart.into());
        }
        ensure_storable(end)?;
        let duration = elapsed_seconds(start, end);
        self.add_manual_event(baby_id, EventPayload::Sleep, Some(start), Some(duration), notes)
            .await
    }

    pub async fn add_pumping_session(
        &self,
        baby_id: BabyId,
        entry: PumpingEntry,
    ) -> Result<Event, TrackerError> {
        let payload = EventPayload::Pumping {
            pumping_side: entry.side,
            milliliters: entry.milliliters,
        };
        self.add_manual_event(
            baby_id,
            payload,
            entry.timestamp,
            entry.duration_secs,
            entry.notes,
        )
        .await
    }

    async fn create(&self, draft: EventDraft) -> Result<Event, TrackerError> {
        let event = self.gateway.create_event(draft).await?;
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type(),
            "event saved"
        );
        self.state().last_created = Some(event.clone());
        Ok(event)
    }

    // ========== Persisted events ==========

    /// The most recently created event, kept for quick follow-up edits.
    pub fn last_created_event(&self) -> Option<Event> {
        self.state().last_created.clone()
    }

    /// Replaces a stored event, refreshing the cached last event if it matches.
    pub async fn update_event(&self, event: &Event) -> Result<(), TrackerError> {
        self.ensure_loggable(&event.baby_id)?;
        ensure_storable(event.timestamp)?;
        self.gateway.update_event(event).await?;

        let mut state = self.state();
        if state
            .last_created
            .as_ref()
            .is_some_and(|cached| cached.id == event.id)
        {
            state.last_created = Some(event.clone());
        }
        Ok(())
    }

    pub async fn delete_event(&self, id: &EventId) -> Result<(), TrackerError> {
        self.gateway.delete_event(id).await?;

        let mut state = self.state();
        if state
            .last_created
            .as_ref()
            .is_some_and(|cached| &cached.id == id)
        {
            state.last_created = None;
        }
        tracing::debug!(event_id = %id, "event deleted");
        Ok(())
    }

    pub async fn fetch_event(&self, id: &EventId) -> Result<Event, TrackerError> {
        self.gateway
            .fetch_event(id)
            .await
            .map_err(TrackerError::from_read)?
            .ok_or_else(|| TrackerError::NotFound { id: id.clone() })
    }

    /// A baby's events, newest first.
    pub async fn query_events(
        &self,
        baby_id: &BabyId,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, TrackerError> {
        self.gateway
            .query_events(baby_id, filter)
            .await
            .map_err(TrackerError::from_read)
    }
}
