//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use bt_core::BabyId;
use bt_core::time::{parse_timestamp, timestamp_from_millis};
use chrono::{DateTime, Duration, Utc};
use regex::{Captures, Regex};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(second|sec|s|minute|min|m|hour|hr|h|day|d)s?\s+ago$")
        .expect("relative time regex is valid")
});

/// Pre-compiled regex for spans such as `90s`, `15m`, `1h30m`.
static SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)\s*h)?\s*(?:(\d+)\s*m)?\s*(?:(\d+)\s*s)?$").expect("span regex is valid")
});

/// Conservative bound for relative input (~100 years in seconds).
const MAX_RELATIVE_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Parse a point in time as ISO 8601, epoch milliseconds, `now`, or relative to `now`.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Epoch milliseconds: "@1768473000000"
/// - "now"
/// - Relative: "20 minutes ago", "2 hours ago", "1 day ago", "90s ago"
pub fn parse_when(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Some(millis) = s.strip_prefix('@') {
        let millis: i64 = millis
            .parse()
            .with_context(|| format!("Invalid epoch milliseconds: {s}"))?;
        return Ok(timestamp_from_millis(millis)?);
    }

    if let Some(caps) = RELATIVE_TIME_RE.captures(s) {
        return relative_to(&caps, now);
    }

    parse_timestamp(s).with_context(|| {
        format!(
            "Invalid time: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '20 minutes ago')"
        )
    })
}

fn relative_to(caps: &Captures<'_>, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let seconds_per_unit = match &caps[2] {
        "second" | "sec" | "s" => 1,
        "minute" | "min" | "m" => 60,
        "hour" | "hr" | "h" => 60 * 60,
        "day" | "d" => 60 * 60 * 24,
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > MAX_RELATIVE_SECONDS / seconds_per_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::seconds(n * seconds_per_unit))
}

/// Parse a span of time such as `45s`, `15m`, `2h` or `1h30m`.
pub fn parse_span(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let caps = SPAN_RE
        .captures(s)
        .filter(|_| !s.is_empty())
        .with_context(|| format!("Invalid duration: {s}. Use e.g. '45s', '15m', '2h' or '1h30m'"))?;

    let mut total: i64 = 0;
    for (index, seconds_per_unit) in [(1, 3600), (2, 60), (3, 1)] {
        if let Some(value) = caps.get(index) {
            let n: i64 = value
                .as_str()
                .parse()
                .with_context(|| format!("duration value too large: {s}"))?;
            total = n
                .checked_mul(seconds_per_unit)
                .and_then(|secs| total.checked_add(secs))
                .filter(|secs| *secs <= MAX_RELATIVE_SECONDS)
                .with_context(|| format!("duration value too large: {s}"))?;
        }
    }
    Ok(Duration::seconds(total))
}

/// Parse a span as whole seconds.
pub fn parse_span_secs(s: &str) -> anyhow::Result<u64> {
    let span = parse_span(s)?;
    u64::try_from(span.num_seconds()).context("duration cannot be negative")
}

/// Picks the baby from the command line, falling back to the configured default.
pub fn resolve_baby(flag: Option<&str>, default_baby: Option<&str>) -> anyhow::Result<BabyId> {
    let Some(id) = flag.or(default_baby) else {
        anyhow::bail!("No baby selected. Pass --baby <id> or set default_baby in config.toml");
    };
    BabyId::new(id).context("invalid baby id")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_core::ValidationError;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_parse_when_iso() {
        let parsed = parse_when("2025-03-01T09:30:00+01:00", now()).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2025-03-01T08:30:00+00:00");
    }

    #[test]
    fn test_parse_when_epoch_millis() {
        assert_eq!(parse_when("@1740830400000", now()).unwrap(), now());
        assert!(parse_when("@soon", now()).is_err());
        let err = parse_when(&format!("@{}", i64::MAX), now()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_parse_when_rejects_unstorable_iso() {
        let err = parse_when("0000-01-01T00:30:00+01:00", now()).unwrap_err();
        assert!(err.to_string().contains("Invalid time"));
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_parse_when_now() {
        assert_eq!(parse_when("now", now()).unwrap(), now());
        assert_eq!(parse_when(" NOW ", now()).unwrap(), now());
    }

    #[test]
    fn test_parse_when_relative_units() {
        assert_eq!(
            parse_when("20 minutes ago", now()).unwrap(),
            now() - Duration::minutes(20)
        );
        assert_eq!(
            parse_when("1 hour ago", now()).unwrap(),
            now() - Duration::hours(1)
        );
        assert_eq!(
            parse_when("90s ago", now()).unwrap(),
            now() - Duration::seconds(90)
        );
        assert_eq!(
            parse_when("2 days ago", now()).unwrap(),
            now() - Duration::days(2)
        );
    }

    #[test]
    fn test_parse_when_rejects_garbage() {
        let err = parse_when("last tuesday", now()).unwrap_err();
        assert!(err.to_string().contains("Invalid time"));
        assert!(parse_when("", now()).is_err());
    }

    #[test]
    fn test_parse_when_rejects_huge_values() {
        let err = parse_when("99999999999 days ago", now()).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_parse_span_forms() {
        assert_eq!(parse_span("45s").unwrap(), Duration::seconds(45));
        assert_eq!(parse_span("15m").unwrap(), Duration::minutes(15));
        assert_eq!(parse_span("2h").unwrap(), Duration::hours(2));
        assert_eq!(parse_span("1h30m").unwrap(), Duration::minutes(90));
        assert_eq!(parse_span("1h 5m 10s").unwrap(), Duration::seconds(3910));
    }

    #[test]
    fn test_parse_span_rejects_invalid() {
        assert!(parse_span("").is_err());
        assert!(parse_span("soon").is_err());
        assert!(parse_span("-5m").is_err());
        assert!(parse_span("5x").is_err());
    }

    #[test]
    fn test_parse_span_secs() {
        assert_eq!(parse_span_secs("7m").unwrap(), 420);
    }

    #[test]
    fn test_resolve_baby_prefers_flag() {
        assert_eq!(
            resolve_baby(Some("b2"), Some("b1")).unwrap().as_str(),
            "b2"
        );
        assert_eq!(resolve_baby(None, Some("b1")).unwrap().as_str(), "b1");
        assert!(resolve_baby(None, None).is_err());
        assert!(resolve_baby(Some("  "), None).is_err());
    }
}
