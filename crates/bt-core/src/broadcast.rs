//! Live-status mirroring (lock-screen widgets, persistent notifications).
//!
//! Broadcasting is best-effort. The session store logs failures and carries on.

use thiserror::Error;

use crate::types::Side;

/// Failure reported by a live-status surface.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    /// The surface is not available on this device or was dismissed.
    #[error("live status unavailable: {0}")]
    Unavailable(String),
    /// The surface rejected the update.
    #[error("live status update rejected: {0}")]
    Rejected(String),
}

/// Command sink that mirrors the running nursing session outside the app.
pub trait LiveStatusBroadcaster: Send + Sync {
    fn announce_start(&self, side: Side, baby_label: &str) -> Result<(), BroadcastError>;
    fn announce_side_change(&self, side: Side) -> Result<(), BroadcastError>;
    fn announce_stop(&self) -> Result<(), BroadcastError>;
}

/// Discards every announcement.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcaster;

impl LiveStatusBroadcaster for NoopBroadcaster {
    fn announce_start(&self, _side: Side, _baby_label: &str) -> Result<(), BroadcastError> {
        Ok(())
    }

    fn announce_side_change(&self, _side: Side) -> Result<(), BroadcastError> {
        Ok(())
    }

    fn announce_stop(&self) -> Result<(), BroadcastError> {
        Ok(())
    }
}

/// Emits announcements as tracing records under the `live_status` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBroadcaster;

impl LiveStatusBroadcaster for LogBroadcaster {
    fn announce_start(&self, side: Side, baby_label: &str) -> Result<(), BroadcastError> {
        tracing::info!(target: "live_status", %side, baby = baby_label, "nursing started");
        Ok(())
    }

    fn announce_side_change(&self, side: Side) -> Result<(), BroadcastError> {
        tracing::info!(target: "live_status", %side, "nursing side changed");
        Ok(())
    }

    fn announce_stop(&self) -> Result<(), BroadcastError> {
        tracing::info!(target: "live_status", "nursing ended");
        Ok(())
    }
}
