//! `bt edit` and `bt delete`.

use std::io::Write;

use anyhow::{Context, Result};
use bt_core::{
    Clock, Event, EventGateway, EventId, EventPayload, LiveStatusBroadcaster, SessionStore,
    normalize_notes,
};
use chrono::{DateTime, Local, Utc};

use super::events::summarize;
use super::user_facing;
use super::util::{parse_span_secs, parse_when};
use crate::cli::EditArgs;

/// Applies the requested changes to `event`.
fn apply_changes(event: &mut Event, args: &EditArgs, now: DateTime<Utc>) -> Result<()> {
    if let Some(at) = &args.at {
        event.timestamp = parse_when(at, now)?;
    }
    if let Some(duration) = &args.duration {
        event.duration_secs = Some(parse_span_secs(duration)?);
    }
    if let Some(new_side) = args.side {
        let EventPayload::Nursing { side } = &mut event.payload else {
            anyhow::bail!("--side only applies to nursing events");
        };
        *side = new_side;
    }
    if args.clear_notes {
        event.notes = None;
    } else if let Some(notes) = &args.notes {
        event.notes = normalize_notes(Some(notes.clone()));
    }
    Ok(())
}

/// Runs `bt edit`.
pub async fn run_edit<G, B, C, W>(
    store: &SessionStore<G, B, C>,
    args: &EditArgs,
    out: &mut W,
) -> Result<Event>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
    W: Write,
{
    let id = EventId::new(args.id.as_str()).context("invalid event id")?;
    let mut event = store.fetch_event(&id).await.map_err(user_facing)?;
    apply_changes(&mut event, args, store.clock().now())?;

    store.update_event(&event).await.map_err(user_facing)?;
    writeln!(out, "Updated {}", summarize(&event, &Local))?;
    Ok(event)
}

/// Runs `bt delete`.
pub async fn run_delete<G, B, C, W>(
    store: &SessionStore<G, B, C>,
    id: &str,
    out: &mut W,
) -> Result<()>
where
    G: EventGateway,
    B: LiveStatusBroadcaster,
    C: Clock,
    W: Write,
{
    let id = EventId::new(id).context("invalid event id")?;
    store.delete_event(&id).await.map_err(user_facing)?;
    writeln!(out, "Deleted {id}")?;
    Ok(())
}
