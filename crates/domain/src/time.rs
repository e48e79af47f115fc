//! Time and timestamp helpers.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// UTC timestamp used for interval bounds, counter samples and analytics windows.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Render a timestamp as RFC 3339 with microsecond precision.
#[must_use]
pub fn format_iso(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an ISO-8601 timestamp.
///
/// Offsets are honoured; timestamps without one are read as UTC, which is how
/// older interval entries were written.
#[must_use]
pub fn parse_iso(raw: &str) -> Option<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_format_with_utc_suffix() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(format_iso(ts), "2024-05-01T08:30:00.000000Z");
    }

    #[test]
    fn should_parse_back_what_it_formats() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        assert_eq!(parse_iso(&format_iso(ts)), Some(ts));
    }

    #[test]
    fn should_read_naive_timestamps_as_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        assert_eq!(parse_iso("2024-05-01T08:30:00.123456"), Some(expected));
    }

    #[test]
    fn should_reject_garbage() {
        assert_eq!(parse_iso("yesterday"), None);
    }
}
