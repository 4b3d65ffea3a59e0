//! Manual entry commands: `bt log`, `bt sleep` and `bt pump`.

use std::io::Write;

use anyhow::Result;
use bt_core::{
    BabyId, Clock, Event, EventGateway, EventPayload, EventType, LiveStatusBroadcaster,
    PumpingEntry, SessionStore,
};
use chrono::Local;

use super::events::summarize;
use super::user_facing;
use super::util::{parse_span_secs, parse_when};
use crate::cli::{LogArgs, PumpArgs, SleepArgs};

/// Runs `bt log`.
pub async fn run_log<G, B, C, W>(
    store: &SessionStore<G, B, C>,
    baby_id: BabyId,
    args: &LogArgs,
    out: &mut W,
) -> Result<Event>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
    W: Write,
{
    match (args.event_type, args.side) {
        (EventType::Nursing, None) => anyhow::bail!("--side is required when logging nursing"),
        (EventType::Nursing | EventType::Pumping, _) | (_, None) => {}
        (other, Some(_)) => anyhow::bail!("--side does not apply to {other} events"),
    }

    let now = store.clock().now();
    let at = args.at.as_deref().map(|s| parse_when(s, now)).transpose()?;
    let duration = args.duration.as_deref().map(parse_span_secs).transpose()?;
    let payload = EventPayload::for_type(args.event_type, args.side);

    let event = store
        .add_manual_event(baby_id, payload, at, duration, args.notes.clone())
        .await
        .map_err(user_facing)?;
    writeln!(out, "Logged {}", summarize(&event, &Local))?;
    Ok(event)
}

/// Runs `bt sleep`.
pub async fn run_sleep<G, B, C, W>(
    store: &SessionStore<G, B, C>,
    baby_id: BabyId,
    args: &SleepArgs,
    out: &mut W,
) -> Result<Event>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
    W: Write,
{
    let now = store.clock().now();
    let start = parse_when(&args.start, now)?;
    let end = args
        .end
        .as_deref()
        .map_or(Ok(now), |s| parse_when(s, now))?;

    let event = store
        .add_sleep_event(baby_id, start, end, args.notes.clone())
        .await
        .map_err(user_facing)?;
    writeln!(out, "Logged {}", summarize(&event, &Local))?;
    Ok(event)
}

/// Runs `bt pump`.
pub async fn run_pump<G, B, C, W>(
    store: &SessionStore<G, B, C>,
    baby_id: BabyId,
    args: &PumpArgs,
    out: &mut W,
) -> Result<Event>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
    W: Write,
{
    let now = store.clock().now();
    let entry = PumpingEntry {
        timestamp: args.at.as_deref().map(|s| parse_when(s, now)).transpose()?,
        duration_secs: args.duration.as_deref().map(parse_span_secs).transpose()?,
        notes: args.notes.clone(),
        side: args.side,
        milliliters: args.ml,
    };

    let event = store
        .add_pumping_session(baby_id, entry)
        .await
        .map_err(user_facing)?;
    writeln!(out, "Logged {}", summarize(&event, &Local))?;
    Ok(event)
}
