//! Conversion between ISO-8601 strings, CF time units and datetimes.
//!
//! All datetimes are naive and interpreted as UTC.

use crate::errors::{EWCError, EWCResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Format used when echoing times back to the caller, e.g. `2000-01-01T00:00Z`
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%MZ";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 time such as `2000-01-01T00:00Z`.
///
/// Seconds, offsets and the `Z` suffix are optional. A bare date is taken as midnight.
pub fn parse_iso_time(value: &str) -> EWCResult<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    let stripped = trimmed
        .strip_suffix('Z')
        .or_else(|| trimmed.strip_suffix(" UTC"))
        .unwrap_or(trimmed);
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(stripped, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(stripped, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| EWCError::InvalidTime {
            value: value.to_string(),
        })
}

/// Format a datetime as `YYYY-MM-DDTHH:MMZ`
pub fn format_iso_time(time: &NaiveDateTime) -> String {
    time.format(ISO_FORMAT).to_string()
}

/// CF-convention time units of the form `<unit> since <reference>`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CfTimeUnits {
    /// Length of one unit in seconds
    pub seconds_per_unit: f64,
    pub reference: NaiveDateTime,
}

impl CfTimeUnits {
    pub fn parse(units: &str) -> EWCResult<Self> {
        let invalid = || EWCError::InvalidTimeUnits(units.to_string());

        let (unit, reference) = units.trim().split_once(" since ").ok_or_else(invalid)?;
        let seconds_per_unit = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600.0,
            "days" | "day" | "d" => 86_400.0,
            "weeks" | "week" => 604_800.0,
            _ => return Err(invalid()),
        };
        let reference = parse_iso_time(reference).map_err(|_| invalid())?;

        Ok(Self {
            seconds_per_unit,
            reference,
        })
    }

    /// Convert a model time expressed in these units to a datetime
    pub fn to_datetime(&self, value: f64) -> EWCResult<NaiveDateTime> {
        let invalid = || EWCError::InvalidTime {
            value: value.to_string(),
        };
        let millis = (value * self.seconds_per_unit * 1_000.0).round();
        // chrono only accepts durations within +/- i64::MAX milliseconds
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return Err(invalid());
        }
        Duration::try_milliseconds(millis as i64)
            .and_then(|offset| self.reference.checked_add_signed(offset))
            .ok_or_else(invalid)
    }
}
