//! Events command for listing a baby's logged events.
//!
//! Prints a table by default, or one JSON object per line with `--json`.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use bt_core::duration::format_duration;
use bt_core::{
    BabyId, Clock, Event, EventFilter, EventGateway, EventPayload, LiveStatusBroadcaster,
    SessionStore,
};
use chrono::{DateTime, TimeZone, Utc};

/// Short human description of the type-specific fields.
pub fn describe_payload(payload: &EventPayload) -> String {
    match payload {
        EventPayload::Nursing { side } => side.to_string(),
        EventPayload::Pumping {
            pumping_side,
            milliliters,
        } => {
            let mut parts = Vec::new();
            if let Some(side) = pumping_side {
                parts.push(side.to_string());
            }
            if let Some(ml) = milliliters {
                parts.push(format!("{ml} ml"));
            }
            parts.join(", ")
        }
        EventPayload::Sleep
        | EventPayload::Diaper
        | EventPayload::Bottle
        | EventPayload::Solids => String::new(),
    }
}

/// One-line summary used after creating or editing an event.
pub fn summarize<Tz>(event: &Event, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut line = format!(
        "{} at {}",
        event.event_type(),
        event.timestamp.with_timezone(tz).format("%Y-%m-%d %H:%M")
    );
    let details = describe_payload(&event.payload);
    if !details.is_empty() {
        write!(line, " ({details})").ok();
    }
    if let Some(secs) = event.duration_secs {
        write!(line, " for {}", format_duration(secs)).ok();
    }
    write!(line, " [{}]", event.id).ok();
    line
}

/// Format events as a table, newest first.
pub fn format_events<Tz>(events: &[Event], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut output = String::new();

    if events.is_empty() {
        writeln!(output, "No events logged.").ok();
        writeln!(output).ok();
        writeln!(output, "Hint: Run 'bt log diaper' or 'bt track' to start logging.").ok();
        return output;
    }

    writeln!(
        output,
        "{:<16}  {:<8}  {:>8}  {:<14}  {:<8}  Notes",
        "When", "Type", "Duration", "Details", "ID"
    )
    .ok();
    writeln!(
        output,
        "────────────────  ────────  ────────  ──────────────  ────────  ─────"
    )
    .ok();

    for event in events {
        let when = event.timestamp.with_timezone(tz).format("%Y-%m-%d %H:%M");
        let duration = event.duration_secs.map(format_duration).unwrap_or_default();
        let id_short: String = event.id.as_str().chars().take(8).collect();
        let notes = event.notes.as_deref().unwrap_or("");
        let row = format!(
            "{when:<16}  {:<8}  {duration:>8}  {:<14}  {id_short:<8}  {notes}",
            event.event_type().as_str(),
            describe_payload(&event.payload),
        );
        writeln!(output, "{}", row.trim_end()).ok();
    }

    output
}

/// Format events as JSON lines.
pub fn format_events_json(events: &[Event]) -> Result<String> {
    let mut output = String::new();
    for event in events {
        writeln!(output, "{}", serde_json::to_string(event)?)?;
    }
    Ok(output)
}

/// Runs the events command.
pub async fn run<G, B, C, W>(
    store: &SessionStore<G, B, C>,
    baby_id: &BabyId,
    filter: &EventFilter,
    json: bool,
    out: &mut W,
) -> Result<()>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
    W: Write,
{
    let events = store.query_events(baby_id, filter).await?;
    let output = if json {
        format_events_json(&events)?
    } else {
        format_events(&events, &chrono::Local)
    };
    write!(out, "{output}")?;
    Ok(())
}

/// Parses the `--since` flag relative to `now`.
pub fn since_filter(since: Option<&str>, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    since.map(|s| super::util::parse_when(s, now)).transpose()
}
