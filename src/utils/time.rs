//! Time and timestamp utilities

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Format a timestamp as ISO-8601 with millisecond precision and a `Z` suffix.
///
/// All timestamps written by this crate use this fixed-width form so that
/// they order correctly as plain strings.
pub fn format_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time as ISO-8601
pub fn now_iso() -> String {
    format_iso(&Utc::now())
}

/// Partition stamp for a calendar day (`YYYY-MM-DD`)
pub fn day_stamp(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Parse a client-supplied timestamp.
///
/// Accepts an RFC 3339 string or a number of milliseconds since the epoch
/// and normalizes it to [`format_iso`]. Anything else yields `None`.
pub fn parse_client_timestamp(value: &Value) -> Option<String> {
    let parsed = match value {
        Value::String(s) if !s.trim().is_empty() => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }?;
    Some(format_iso(&parsed))
}

/// Strictly increasing server timestamps.
///
/// Two calls never return the same string, even within one millisecond or
/// when the wall clock steps backwards; the later call is bumped one
/// millisecond past the previous one.
#[derive(Debug, Default)]
pub struct ServerTimestamps {
    last_ms: AtomicI64,
}

impl ServerTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next timestamp as ISO-8601
    pub fn next(&self) -> String {
        let now = Utc::now().timestamp_millis();
        let mut previous = self.last_ms.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(previous + 1);
            match self.last_ms.compare_exchange(
                previous,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return format_millis(candidate),
                Err(actual) => previous = actual,
            }
        }
    }
}

fn format_millis(ms: i64) -> String {
    let ts = Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now);
    format_iso(&ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_iso_is_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_iso(&ts), "2024-03-05T07:08:09.000Z");
    }

    #[test]
    fn test_day_stamp() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(day_stamp(day), "2024-01-09");
    }

    #[test]
    fn test_parse_client_timestamp() {
        assert_eq!(
            parse_client_timestamp(&json!("2024-01-01T10:00:00+02:00")).as_deref(),
            Some("2024-01-01T08:00:00.000Z")
        );
        assert_eq!(
            parse_client_timestamp(&json!(0)).as_deref(),
            Some("1970-01-01T00:00:00.000Z")
        );
        assert_eq!(parse_client_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_client_timestamp(&json!(null)), None);
        assert_eq!(parse_client_timestamp(&json!(true)), None);
    }

    #[test]
    fn test_server_timestamps_strictly_increase() {
        let stamps = ServerTimestamps::new();
        let mut previous = stamps.next();
        for _ in 0..100 {
            let next = stamps.next();
            assert!(next > previous, "{} should sort after {}", next, previous);
            previous = next;
        }
    }
}
