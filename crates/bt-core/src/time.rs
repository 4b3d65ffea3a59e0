//! Clock abstraction and timestamp parsing at the input boundary.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::types::ValidationError;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and give another to the component under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Years that fit the four-digit RFC 3339 form events are stored in.
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// Rejects timestamps that cannot be written and read back as RFC 3339.
pub fn ensure_storable(timestamp: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
    if STORABLE_YEARS.contains(&timestamp.year()) {
        Ok(timestamp)
    } else {
        Err(ValidationError::InvalidTimestamp {
            value: timestamp.to_rfc3339(),
        })
    }
}

/// Parses an RFC 3339 timestamp, normalizing to UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    let parsed = DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidTimestamp {
            value: s.to_string(),
        })?;
    ensure_storable(parsed)
}

/// Converts epoch milliseconds to a timestamp, rejecting out-of-range values.
pub fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ValidationError::InvalidTimestamp {
            value: millis.to_string(),
        })
        .and_then(ensure_storable)
}

/// Whole seconds from `start` to `end`, floored and clamped to zero.
#[must_use]
pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let millis = (end - start).num_milliseconds();
    u64::try_from(millis.div_euclid(1000)).unwrap_or(0)
}
