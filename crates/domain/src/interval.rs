//! On-intervals: the periods during which a device was in an on-like status.
//!
//! Intervals are persisted as JSON pairs `[start_iso, end_iso_or_null]` in an
//! ordered list per device; at most the last entry is open.

use chrono::Duration;

use crate::time::{Timestamp, format_iso, parse_iso};

/// A period of use. `end` is `None` while the device is still on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnInterval {
    pub start: Timestamp,
    pub end: Option<Timestamp>,
}

/// A stored interval entry that cannot be read back.
#[derive(Debug, thiserror::Error)]
pub enum IntervalDecodeError {
    #[error("interval entry is not a [start, end] pair")]
    Shape(#[from] serde_json::Error),

    #[error("interval entry holds an invalid timestamp '{0}'")]
    Timestamp(String),
}

impl OnInterval {
    /// An interval starting at `start` and still running.
    #[must_use]
    pub fn open(start: Timestamp) -> Self {
        Self { start, end: None }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Close the interval at `end`.
    #[must_use]
    pub fn close(self, end: Timestamp) -> Self {
        Self {
            start: self.start,
            end: Some(end),
        }
    }

    /// Elapsed seconds of a closed interval. Never negative.
    #[must_use]
    pub fn seconds(&self) -> Option<f64> {
        self.end.map(|end| seconds_between(self.start, end))
    }

    /// Seconds of this interval falling inside `[from, to)`.
    ///
    /// An open interval is considered to run until `now`.
    #[must_use]
    pub fn overlap_seconds(&self, from: Timestamp, to: Timestamp, now: Timestamp) -> f64 {
        let end = self.end.unwrap_or(now).min(to);
        let start = self.start.max(from);
        seconds_between(start, end)
    }

    /// Encode as the stored `[start, end]` pair.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::json!([format_iso(self.start), self.end.map(format_iso)]).to_string()
    }

    /// Decode a stored `[start, end]` pair.
    ///
    /// # Errors
    ///
    /// Returns [`IntervalDecodeError`] when the entry is not a pair of
    /// timestamps.
    pub fn decode(entry: &str) -> Result<Self, IntervalDecodeError> {
        let (start, end): (String, Option<String>) = serde_json::from_str(entry)?;
        let start = parse_iso(&start).ok_or(IntervalDecodeError::Timestamp(start))?;
        let end = match end {
            Some(raw) => Some(parse_iso(&raw).ok_or(IntervalDecodeError::Timestamp(raw))?),
            None => None,
        };
        Ok(Self { start, end })
    }
}

fn seconds_between(start: Timestamp, end: Timestamp) -> f64 {
    let elapsed = (end - start).max(Duration::zero());
    #[allow(clippy::cast_precision_loss)]
    let micros = elapsed.num_microseconds().unwrap_or(i64::MAX) as f64;
    micros / 1_000_000.0
}
