//! Command-line argument definitions.

use std::path::PathBuf;

use bt_core::{EventType, PumpingSide, Side};
use clap::{Args, Parser, Subcommand};

/// Baby activity tracker.
///
/// Logs nursing, sleep, diapers and feeds, and tracks live nursing and sleep
/// sessions from the terminal.
#[derive(Debug, Parser)]
#[command(name = "bt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Baby profile to act on (defaults to `default_baby` from config).
    #[arg(short, long, global = true)]
    pub baby: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log an event that already happened.
    Log(LogArgs),

    /// Log a completed sleep from its start and end.
    Sleep(SleepArgs),

    /// Log a pumping session.
    Pump(PumpArgs),

    /// List logged events, newest first.
    Events {
        /// Only show events of this type.
        #[arg(long = "type")]
        event_type: Option<EventType>,

        /// Only show events at or after this time (e.g., '1 day ago').
        #[arg(long)]
        since: Option<String>,

        /// Maximum number of events to show.
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Output as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Change fields of a logged event.
    Edit(EditArgs),

    /// Delete a logged event.
    Delete {
        /// ID of the event to delete.
        id: String,
    },

    /// Track nursing and sleep sessions interactively.
    Track {
        /// Seconds between live display refreshes.
        #[arg(long, default_value_t = 1)]
        tick: u64,
    },
}

/// Arguments for `bt log`.
#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Event type (nursing, sleep, diaper, pumping, bottle, solids).
    pub event_type: EventType,

    /// When it happened (e.g., '20 minutes ago'). Defaults to now.
    #[arg(long)]
    pub at: Option<String>,

    /// How long it lasted (e.g., '15m', '1h30m').
    #[arg(short, long)]
    pub duration: Option<String>,

    /// Side, for nursing and pumping.
    #[arg(short, long)]
    pub side: Option<Side>,

    #[arg(long)]
    pub notes: Option<String>,
}

/// Arguments for `bt sleep`.
#[derive(Debug, Clone, Args)]
pub struct SleepArgs {
    /// When the sleep started.
    #[arg(long)]
    pub start: String,

    /// When the sleep ended. Defaults to now.
    #[arg(long)]
    pub end: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,
}

/// Arguments for `bt pump`.
#[derive(Debug, Clone, Args)]
pub struct PumpArgs {
    /// When the session started. Defaults to now.
    #[arg(long)]
    pub at: Option<String>,

    /// How long it lasted (e.g., '15m').
    #[arg(short, long)]
    pub duration: Option<String>,

    /// left, right or both.
    #[arg(short, long)]
    pub side: Option<PumpingSide>,

    /// Amount pumped, in milliliters.
    #[arg(long)]
    pub ml: Option<u32>,

    #[arg(long)]
    pub notes: Option<String>,
}

/// Arguments for `bt edit`.
#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    /// ID of the event to change.
    pub id: String,

    /// New start time.
    #[arg(long)]
    pub at: Option<String>,

    /// New duration (e.g., '7m').
    #[arg(short, long)]
    pub duration: Option<String>,

    /// New side, for nursing events.
    #[arg(short, long)]
    pub side: Option<Side>,

    /// Replace the notes.
    #[arg(long, conflicts_with = "clear_notes")]
    pub notes: Option<String>,

    /// Remove the notes.
    #[arg(long)]
    pub clear_notes: bool,
}
