//! Calendar timestamp text formats.
//!
//! Boundary series and model documents use `MM/DD/YYYY HH:MM`. ISO-8601
//! and bare dates are accepted on input and normalized on output.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Canonical timestamp format for series keys and series records.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M";
/// Date format used by `[OPTIONS]` date keys.
pub const DATE_FORMAT: &str = "%m/%d/%Y";
/// Time-of-day format used by `[OPTIONS]` time keys.
pub const TIME_FORMAT: &str = "%H:%M:%S";

const ACCEPTED_DATETIME_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const ACCEPTED_DATE_FORMATS: &[&str] = &[DATE_FORMAT, "%Y-%m-%d"];

/// Parses a timestamp in any accepted format. Bare dates map to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    ACCEPTED_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            ACCEPTED_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Renders a timestamp in the canonical format.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Serde adapter for `NaiveDateTime` fields in the canonical format.
pub mod canonical {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp \"{raw}\"")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, 0))
            .expect("valid test date")
    }

    #[test]
    fn parses_canonical_and_iso() {
        assert_eq!(
            parse_timestamp("03/15/2024 06:30"),
            Some(at(2024, 3, 15, 6, 30))
        );
        assert_eq!(
            parse_timestamp("2024-03-15T06:30:00"),
            Some(at(2024, 3, 15, 6, 30))
        );
        assert_eq!(parse_timestamp("03/15/2024"), Some(at(2024, 3, 15, 0, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("15/03/2024 06:30"), None);
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn formats_canonically() {
        assert_eq!(format_timestamp(&at(2024, 1, 2, 3, 0)), "01/02/2024 03:00");
    }
}
