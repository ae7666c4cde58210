//! Wire encoding for `Wait.wait_for`: duration, timestamp, or opaque event tag.
//!
//! Mirrors the original `WaitOperator.parse_wait_for` / `model_dump` pair:
//! encode durations as `PT<seconds>S`, timestamps as full ISO-8601, and accept
//! the historical `duration:<seconds>` / `datetime:<iso>` prefixes on decode.

use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

/// Encode a duration the way the legacy Python `model_dump` did:
/// `f"PT{total_seconds}S"` where `total_seconds` always renders with a
/// decimal point (Rust's `{:?}` float formatting matches Python's `str(float)`
/// for this purpose).
#[must_use]
pub fn encode_duration(d: Duration) -> String {
    format!("PT{:?}S", d.as_secs_f64())
}

#[must_use]
pub fn encode_timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn iso_duration_regex() -> Regex {
    // Not anchored at source: a match() semantics, trailing garbage is ignored,
    // matching the original's use of `re.match` rather than `re.fullmatch`.
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?")
        .expect("static regex is valid")
}

/// Try, in order: legacy `duration:`/`datetime:` prefixes, ISO-8601 duration,
/// ISO-8601 timestamp, else treat the string as an opaque event tag.
pub fn decode_wait_for(raw: &str) -> WireWaitFor {
    if let Some(rest) = raw.strip_prefix("duration:") {
        if let Ok(secs) = rest.parse::<f64>() {
            return WireWaitFor::Duration(Duration::from_secs_f64(secs));
        }
    }
    if let Some(rest) = raw.strip_prefix("datetime:") {
        if let Ok(ts) = DateTime::parse_from_rfc3339(rest) {
            return WireWaitFor::Timestamp(ts.with_timezone(&Utc));
        }
    }
    if raw.starts_with("PT") {
        let re = iso_duration_regex();
        if let Some(caps) = re.captures(raw) {
            let hours: f64 = caps.get(1).map_or(0.0, |m| m.as_str().parse().unwrap_or(0.0));
            let minutes: f64 = caps.get(2).map_or(0.0, |m| m.as_str().parse().unwrap_or(0.0));
            let seconds: f64 = caps.get(3).map_or(0.0, |m| m.as_str().parse().unwrap_or(0.0));
            let total = hours * 3600.0 + minutes * 60.0 + seconds;
            return WireWaitFor::Duration(Duration::from_secs_f64(total));
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return WireWaitFor::Timestamp(ts.with_timezone(&Utc));
    }
    WireWaitFor::Event(raw.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub enum WireWaitFor {
    Duration(Duration),
    Timestamp(DateTime<Utc>),
    Event(String),
}
