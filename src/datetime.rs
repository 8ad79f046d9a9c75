//! Serde helpers for the API's fixed date-time format.
//!
//! Dates are written as `2021-09-15T10:20:30+0000`. The live event stream
//! uses the RFC 3339 colon offset (`+00:00`), which is accepted on decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// `strftime` pattern used for every date field.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Format a timestamp with [`DATE_FORMAT`].
pub fn format(value: &DateTime<Utc>) -> String {
    value.format(DATE_FORMAT).to_string()
}

/// Parse a timestamp written with [`DATE_FORMAT`] or as RFC 3339.
pub fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(value, DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format(value))
}

pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(d)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_numeric_offset() {
        let dt = Utc.with_ymd_and_hms(2021, 9, 15, 10, 20, 30).unwrap();
        assert_eq!(format(&dt), "2021-09-15T10:20:30+0000");
    }

    #[test]
    fn parses_numeric_and_colon_offsets() {
        let expected = Utc.with_ymd_and_hms(2021, 9, 15, 8, 20, 30).unwrap();
        assert_eq!(parse("2021-09-15T10:20:30+0200").unwrap(), expected);
        assert_eq!(parse("2021-09-15T10:20:30+02:00").unwrap(), expected);
    }

    #[test]
    fn rejects_date_without_time() {
        assert!(parse("2021-09-15").is_err());
    }
}
