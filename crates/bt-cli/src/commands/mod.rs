//! CLI subcommand implementations.

pub mod edit;
pub mod events;
pub mod log;
pub mod track;
pub mod util;

use bt_core::TrackerError;

/// Converts a tracker error so the short user-facing message is shown first.
pub fn user_facing(err: TrackerError) -> anyhow::Error {
    let message = err.user_message();
    if message == err.to_string() {
        anyhow::Error::new(err)
    } else {
        anyhow::Error::new(err).context(message)
    }
}
