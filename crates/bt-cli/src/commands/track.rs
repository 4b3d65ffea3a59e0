//! Interactive live session tracking (`bt track`).
//!
//! Reads one command per line from stdin while a timer redraws the running
//! sessions. Sessions live only as long as this process.

use std::fmt::Write as _;
use std::io::Write;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use bt_core::duration::{format_clock, format_duration};
use bt_core::{
    BabyId, Clock, EventGateway, LiveStatusBroadcaster, SessionKind, SessionStore, Side,
    SlotState, TrackerError,
};
use chrono::{DateTime, Local, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

use super::events::summarize;
use super::util::{parse_span, parse_when};

const HELP: &str = "\
Nursing:
  nurse <left|right>     start nursing
  switch [left|right]    change side (defaults to the other side)
  stop [notes]           save the nursing session
  cancel                 discard the nursing session
Sleep:
  sleep [when]           start sleep, optionally backdated (e.g., '20 minutes ago')
  adjust <when>          move the sleep start
  wake <in>              set a wake alarm (e.g., '45m', '1h30m')
  unwake                 clear the wake alarm
  wake-stop [notes]      save the sleep session
  sleep-cancel           discard the sleep session
Other:
  status                 show running sessions
  help                   show this help
  quit                   leave (quit! discards running sessions)";

/// A parsed REPL command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackCommand {
    Nurse(Side),
    Switch(Option<Side>),
    Stop(Option<String>),
    Cancel,
    Sleep(Option<DateTime<Utc>>),
    Adjust(DateTime<Utc>),
    Wake(DateTime<Utc>),
    Unwake,
    WakeStop(Option<String>),
    SleepCancel,
    Status,
    Help,
    Quit { force: bool },
}

/// Whether the REPL should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

fn rest_as_notes(rest: &str) -> Option<String> {
    let rest = rest.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    let rest = rest.trim();
    if rest.is_empty() {
        anyhow::bail!("usage: {usage}");
    }
    Ok(rest)
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str, now: DateTime<Utc>) -> Result<Option<TrackCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

    let command = match word.to_ascii_lowercase().as_str() {
        "nurse" | "n" => TrackCommand::Nurse(required(rest, "nurse <left|right>")?.parse()?),
        "switch" | "sw" => {
            let rest = rest.trim();
            TrackCommand::Switch(if rest.is_empty() { None } else { Some(rest.parse()?) })
        }
        "stop" => TrackCommand::Stop(rest_as_notes(rest)),
        "cancel" => TrackCommand::Cancel,
        "sleep" | "s" => {
            let rest = rest.trim();
            TrackCommand::Sleep(if rest.is_empty() {
                None
            } else {
                Some(parse_when(rest, now)?)
            })
        }
        "adjust" => TrackCommand::Adjust(parse_when(required(rest, "adjust <when>")?, now)?),
        "wake" => TrackCommand::Wake(now + parse_span(required(rest, "wake <in>")?)?),
        "unwake" => TrackCommand::Unwake,
        "wake-stop" | "ws" => TrackCommand::WakeStop(rest_as_notes(rest)),
        "sleep-cancel" => TrackCommand::SleepCancel,
        "status" | "st" => TrackCommand::Status,
        "help" | "?" => TrackCommand::Help,
        "quit" | "q" | "exit" => TrackCommand::Quit { force: false },
        "quit!" | "q!" => TrackCommand::Quit { force: true },
        other => anyhow::bail!("unknown command: {other} (type 'help')"),
    };
    Ok(Some(command))
}

/// Multi-line description of what is running.
pub fn status_report<G, B, C>(store: &SessionStore<G, B, C>) -> String
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
{
    let mut report = String::new();
    if let Some(session) = store.active_nursing_session() {
        writeln!(
            report,
            "Nursing: {} side, {}",
            session.side,
            store.nursing_elapsed_display()
        )
        .ok();
    } else {
        writeln!(report, "Nursing: idle").ok();
    }

    if let Some(session) = store.sleep_session() {
        write!(
            report,
            "Sleep: since {}, {}",
            session.start_time.with_timezone(&Local).format("%H:%M"),
            store.sleep_elapsed_display()
        )
        .ok();
        if store.is_wake_timer_triggered() {
            write!(report, ", wake alarm due").ok();
        } else if let Some(remaining) = store.wake_timer_remaining_seconds() {
            write!(report, ", wake alarm in {}", format_duration(remaining)).ok();
        }
        writeln!(report).ok();
    } else {
        writeln!(report, "Sleep: idle").ok();
    }

    if let Some(event) = store.last_created_event() {
        writeln!(report, "Last saved: {}", summarize(&event, &Local)).ok();
    }
    report
}

/// Compact one-line display for the refresh timer.
pub fn live_line<G, B, C>(store: &SessionStore<G, B, C>) -> Option<String>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
{
    let mut parts = Vec::new();
    if let Some(session) = store.active_nursing_session() {
        parts.push(format!(
            "nursing {} {}",
            session.side,
            format_clock(store.nursing_elapsed_seconds())
        ));
    }
    if store.is_sleep_in_progress() {
        let mut part = format!("sleep {}", format_clock(store.sleep_elapsed_seconds()));
        if let Some(remaining) = store.wake_timer_remaining_seconds() {
            write!(part, " (wake in {})", format_duration(remaining)).ok();
        }
        parts.push(part);
    }
    (!parts.is_empty()).then(|| parts.join(" | "))
}

/// Reports a due wake alarm once; resets when the alarm is cleared.
pub fn wake_alarm_due<G, B, C>(store: &SessionStore<G, B, C>, reported: &mut bool) -> bool
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
{
    let triggered = store.is_wake_timer_triggered();
    let newly_due = triggered && !*reported;
    *reported = triggered;
    newly_due
}

/// Runs one command against the store.
///
/// Store errors are reported to `out` and do not end the session.
pub async fn execute<G, B, C, W>(
    store: &SessionStore<G, B, C>,
    baby_id: &BabyId,
    command: TrackCommand,
    out: &mut W,
) -> Result<Flow>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
    W: Write,
{
    let outcome = match command {
        TrackCommand::Nurse(side) => store
            .start_nursing_session(baby_id.clone(), side)
            .map(|_| format!("Nursing started on {side}.")),
        TrackCommand::Switch(side) => side
            .or_else(|| store.active_nursing_session().map(|s| s.side.opposite()))
            .ok_or(TrackerError::InvalidState {
                kind: SessionKind::Nursing,
                state: SlotState::Idle,
            })
            .and_then(|side| {
                store
                    .switch_nursing_side(side)
                    .map(|()| format!("Switched to {side}."))
            }),
        TrackCommand::Stop(notes) => store
            .stop_nursing_session(notes, None)
            .await
            .map(|event| format!("Saved {}", summarize(&event, &Local))),
        TrackCommand::Cancel => store
            .cancel_nursing_session()
            .map(|()| "Nursing session discarded.".to_string()),
        TrackCommand::Sleep(start) => store
            .start_sleep_session(baby_id.clone(), start)
            .map(|_| "Sleep started.".to_string()),
        TrackCommand::Adjust(start) => store.adjust_sleep_start_time(start).map(|()| {
            format!(
                "Sleep start moved to {}.",
                start.with_timezone(&Local).format("%H:%M")
            )
        }),
        TrackCommand::Wake(at) => store.set_wake_timer(at).map(|()| {
            format!(
                "Wake alarm set for {}.",
                at.with_timezone(&Local).format("%H:%M")
            )
        }),
        TrackCommand::Unwake => store
            .cancel_wake_timer()
            .map(|()| "Wake alarm cleared.".to_string()),
        TrackCommand::WakeStop(notes) => store
            .stop_sleep_session(notes)
            .await
            .map(|event| format!("Saved {}", summarize(&event, &Local))),
        TrackCommand::SleepCancel => store
            .cancel_sleep_session()
            .map(|()| "Sleep session discarded.".to_string()),
        TrackCommand::Status => Ok(status_report(store).trim_end().to_string()),
        TrackCommand::Help => Ok(HELP.to_string()),
        TrackCommand::Quit { force } => {
            if force || !(store.is_nursing_in_progress() || store.is_sleep_in_progress()) {
                return Ok(Flow::Quit);
            }
            Ok("A session is still running and would be lost. Stop or cancel it, \
                or type 'quit!' to leave anyway."
                .to_string())
        }
    };

    match outcome {
        Ok(message) => writeln!(out, "{message}")?,
        Err(err) => {
            tracing::debug!(error = %err, "track command failed");
            writeln!(out, "! {}", err.user_message())?;
        }
    }
    Ok(Flow::Continue)
}

/// Runs the interactive loop until `quit` or end of input.
pub async fn run<G, B, C>(store: &SessionStore<G, B, C>, baby_id: BabyId, tick: StdDuration) -> Result<()>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = std::io::stdout();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut alarm_reported = false;

    writeln!(out, "Tracking {baby_id}. Type 'help' for commands.")?;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read input")? else {
                    if store.is_nursing_in_progress() || store.is_sleep_in_progress() {
                        tracing::warn!("input closed with a session still running; it was not saved");
                    }
                    break;
                };
                match parse_command(&line, store.clock().now()) {
                    Ok(Some(command)) => {
                        if execute(store, &baby_id, command, &mut out).await? == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => writeln!(out, "! {err}")?,
                }
            }
            _ = ticker.tick() => {
                if wake_alarm_due(store, &mut alarm_reported) {
                    writeln!(out)?;
                    writeln!(out, "*** Wake alarm: time to wake up ***")?;
                }
                if let Some(line) = live_line(store) {
                    write!(out, "\r{line}  ")?;
                    out.flush()?;
                }
            }
        }
    }
    writeln!(out)?;
    Ok(())
}
