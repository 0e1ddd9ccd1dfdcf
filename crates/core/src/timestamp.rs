//! Point-in-time markers
//!
//! Timestamps have second granularity and a fixed-width canonical text form
//! (`2024-01-01-00:00:00`), so lexicographic order of the text equals
//! chronological order. Storage keys rely on that.

use crate::error::{Result, RewindError};
use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical text format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";

/// Additional accepted input formats, tried in order after the canonical one.
const ALTERNATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Date-only input format, resolved to the last second of that day.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A wall-clock instant truncated to whole seconds.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Current local time.
    pub fn now() -> Self {
        Self::from_datetime(Local::now().naive_local())
    }

    /// Wrap a datetime, dropping sub-second precision.
    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self(datetime.with_nanosecond(0).unwrap_or(datetime))
    }

    /// Parse user or stored input.
    ///
    /// Accepts the canonical form, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
    /// and a bare `YYYY-MM-DD` which means "as of the end of that day".
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Ok(dt) = NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT) {
            return Ok(Self::from_datetime(dt));
        }

        for format in ALTERNATE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
                return Ok(Self::from_datetime(dt));
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(input, DATE_FORMAT) {
            if let Some(dt) = date.and_hms_opt(23, 59, 59) {
                return Ok(Self(dt));
            }
        }

        Err(RewindError::invalid(format!(
            "Malformed timestamp '{}' (expected YYYY-MM-DD-HH:MM:SS)",
            input
        )))
    }

    /// The underlying datetime.
    pub fn as_datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Compact form used for directory names (`20240101_000000`).
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d_%H%M%S").to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self)
    }
}

impl FromStr for Timestamp {
    type Err = RewindError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = RewindError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_canonical_roundtrip() {
        let ts = Timestamp::parse("2024-01-01-00:00:00").unwrap();
        assert_eq!(ts.to_string(), "2024-01-01-00:00:00");
    }

    #[test]
    fn test_alternate_formats() {
        let canonical = Timestamp::parse("2024-03-05-14:30:00").unwrap();
        assert_eq!(Timestamp::parse("2024-03-05 14:30:00").unwrap(), canonical);
        assert_eq!(Timestamp::parse("2024-03-05T14:30:00").unwrap(), canonical);
        assert_eq!(Timestamp::parse("  2024-03-05-14:30:00\n").unwrap(), canonical);
    }

    #[test]
    fn test_bare_date_is_end_of_day() {
        let ts = Timestamp::parse("2024-03-05").unwrap();
        assert_eq!(ts.to_string(), "2024-03-05-23:59:59");
    }

    #[test]
    fn test_malformed_is_invalid_argument() {
        for bad in ["", "yesterday", "2024-13-01-00:00:00", "2024-01-01-25:00:00", "12345"] {
            let err = Timestamp::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "input: {:?}", bad);
        }
    }

    #[test]
    fn test_text_order_matches_time_order() {
        let a = Timestamp::parse("2024-01-01-09:59:59").unwrap();
        let b = Timestamp::parse("2024-01-01-10:00:00").unwrap();
        let c = Timestamp::parse("2024-12-31-00:00:00").unwrap();

        assert!(a < b && b < c);
        assert!(a.to_string() < b.to_string());
        assert!(b.to_string() < c.to_string());
    }

    #[test]
    fn test_now_has_no_subsecond_part() {
        let now = Timestamp::now();
        assert_eq!(now.as_datetime().nanosecond(), 0);
    }

    #[test]
    fn test_compact_form() {
        let ts = Timestamp::parse("2024-01-02-03:04:05").unwrap();
        assert_eq!(ts.compact(), "20240102_030405");
    }
}
