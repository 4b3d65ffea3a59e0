//! Live, not-yet-persisted nursing and sleep sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventDraft, EventPayload};
use crate::time::elapsed_seconds;
use crate::types::{BabyId, SessionId, Side};

/// A nursing session that is currently running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveNursingSession {
    pub session_id: SessionId,
    pub baby_id: BabyId,
    /// Side currently in use. Only the side in effect at stop is recorded.
    pub side: Side,
    pub start_time: DateTime<Utc>,
}

impl ActiveNursingSession {
    #[must_use]
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        elapsed_seconds(self.start_time, now)
    }

    /// Builds the event this session finalizes into when stopped at `now`.
    #[must_use]
    pub fn finalize(
        &self,
        now: DateTime<Utc>,
        notes: Option<String>,
        side_override: Option<Side>,
    ) -> EventDraft {
        EventDraft::new(
            self.baby_id.clone(),
            self.start_time,
            EventPayload::Nursing {
                side: side_override.unwrap_or(self.side),
            },
        )
        .with_id(self.session_id.clone())
        .with_duration(Some(self.elapsed_seconds(now)))
        .with_notes(notes)
    }
}

/// A sleep session that is currently running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSleepSession {
    pub session_id: SessionId,
    pub baby_id: BabyId,
    pub start_time: DateTime<Utc>,
    /// When the armed wake alarm goes off.
    pub wake_timer_set_for: Option<DateTime<Utc>>,
    /// Latched once the wake alarm time has been observed as passed.
    pub wake_timer_triggered: bool,
}

impl ActiveSleepSession {
    #[must_use]
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        elapsed_seconds(self.start_time, now)
    }

    pub fn arm_wake_timer(&mut self, wake_time: DateTime<Utc>) {
        self.wake_timer_set_for = Some(wake_time);
        self.wake_timer_triggered = false;
    }

    pub fn clear_wake_timer(&mut self) {
        self.wake_timer_set_for = None;
        self.wake_timer_triggered = false;
    }

    /// Reports whether the wake alarm has gone off, latching the result.
    pub fn poll_wake_timer(&mut self, now: DateTime<Utc>) -> bool {
        if !self.wake_timer_triggered
            && self.wake_timer_set_for.is_some_and(|wake| now >= wake)
        {
            self.wake_timer_triggered = true;
        }
        self.wake_timer_triggered
    }

    /// Seconds until the wake alarm, zero once it is due.
    #[must_use]
    pub fn wake_timer_remaining(&self, now: DateTime<Utc>) -> Option<u64> {
        self.wake_timer_set_for.map(|wake| elapsed_seconds(now, wake))
    }

    /// Builds the event this session finalizes into when stopped at `now`.
    #[must_use]
    pub fn finalize(&self, now: DateTime<Utc>, notes: Option<String>) -> EventDraft {
        EventDraft::new(self.baby_id.clone(), self.start_time, EventPayload::Sleep)
            .with_id(self.session_id.clone())
            .with_duration(Some(self.elapsed_seconds(now)))
            .with_notes(notes)
    }
}
