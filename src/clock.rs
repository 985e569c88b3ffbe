//! Timestamps for task headers and log entries.
//!
//! Everything on disk is RFC 3339 at whole-second precision with an explicit
//! offset, e.g. `2025-02-01T09:00:00+01:00`, so values sort as text and
//! re-serialize byte for byte.

use chrono::{
    DateTime, Datelike, Days, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Weekday,
};

use crate::error::{Error, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

pub type Timestamp = DateTime<FixedOffset>;

/// Current local time, truncated to whole seconds.
pub fn now() -> Timestamp {
    let local = Local::now().fixed_offset();
    local.with_nanosecond(0).unwrap_or(local)
}

/// Placeholder for headers that never carried a timestamp.
pub fn epoch() -> Timestamp {
    DateTime::<chrono::Utc>::default().fixed_offset()
}

pub fn format(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse(raw: &str) -> std::result::Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw.trim())
}

/// Parse a header timestamp written by hand.
///
/// Besides RFC 3339 this takes YAML's looser forms: `2025-02-01`,
/// `2025-02-01 09:30:00` and `2025-02-01T09:30:00`. Values without an offset
/// are UTC; a bare date is midnight.
pub fn parse_header(raw: &str) -> std::result::Result<Timestamp, chrono::ParseError> {
    let raw = raw.trim();
    let err = match parse(raw) {
        Ok(ts) => return Ok(ts),
        Err(err) => err,
    };
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => Ok(date.and_time(NaiveTime::MIN).and_utc().fixed_offset()),
        Err(_) => Err(err),
    }
}

/// Serde adapter for required timestamp fields.
pub mod rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Timestamp;

    pub fn serialize<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_header(&raw).map_err(serde::de::Error::custom)
    }

    /// Serde adapter for optional timestamp fields.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::Timestamp;

        pub fn serialize<S: Serializer>(
            ts: &Option<Timestamp>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => serializer.serialize_str(&super::super::format(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Timestamp>, D::Error> {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw {
                Some(raw) if !raw.trim().is_empty() => super::super::parse_header(&raw)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                _ => Ok(None),
            }
        }
    }
}

/// Parse a due date in the local time zone.
///
/// Wall-clock inputs take the offset in force on the due date itself, so a
/// date across a daylight-saving change keeps its local noon.
pub fn parse_due(input: &str) -> Result<Timestamp> {
    parse_due_at(input, Local::now())
}

/// Parse a due date relative to `now`, resolving wall-clock times in `now`'s
/// time zone.
///
/// Accepts `today`, `tomorrow`, a weekday (`fri`), `next <weekday>`,
/// `YYYY-MM-DD` (noon), `YYYY-MM-DDTHH:MM[:SS]` and full RFC 3339.
pub fn parse_due_at<Tz: TimeZone>(input: &str, now: DateTime<Tz>) -> Result<Timestamp> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid_due(input));
    }

    if let Some(ts) = parse_due_natural(trimmed, &now) {
        return Ok(ts);
    }

    let zone = now.timezone();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return noon_on(date, &zone).ok_or_else(|| invalid_due(input));
    }

    for layout in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, layout) {
            return in_zone(naive, &zone).ok_or_else(|| invalid_due(input));
        }
    }

    parse(trimmed).map_err(|_| invalid_due(input))
}

fn invalid_due(input: &str) -> Error {
    Error::InvalidArgument(format!("invalid due date: {input}"))
}

fn parse_due_natural<Tz: TimeZone>(input: &str, now: &DateTime<Tz>) -> Option<Timestamp> {
    let normalized = input.to_ascii_lowercase();
    match normalized.as_str() {
        "today" => return days_from_now_at_noon(now, 0),
        "tomorrow" => return days_from_now_at_noon(now, 1),
        _ => {}
    }

    let fields: Vec<&str> = normalized.split_whitespace().collect();
    match fields.as_slice() {
        ["next", day] => parse_weekday(day).and_then(|wd| next_weekday_at_noon(now, wd, true)),
        [day] => parse_weekday(day).and_then(|wd| next_weekday_at_noon(now, wd, false)),
        _ => None,
    }
}

fn parse_weekday(input: &str) -> Option<Weekday> {
    match input {
        "sun" | "sunday" => Some(Weekday::Sun),
        "mon" | "monday" => Some(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Some(Weekday::Tue),
        "wed" | "weds" | "wednesday" => Some(Weekday::Wed),
        "thu" | "thur" | "thurs" | "thursday" => Some(Weekday::Thu),
        "fri" | "friday" => Some(Weekday::Fri),
        "sat" | "saturday" => Some(Weekday::Sat),
        _ => None,
    }
}

fn next_weekday_at_noon<Tz: TimeZone>(
    now: &DateTime<Tz>,
    weekday: Weekday,
    force_next_week: bool,
) -> Option<Timestamp> {
    let target = weekday.num_days_from_sunday() as i64;
    let current = now.weekday().num_days_from_sunday() as i64;
    let mut days_ahead = (target - current + 7) % 7;
    if force_next_week && days_ahead == 0 {
        days_ahead = 7;
    }
    days_from_now_at_noon(now, days_ahead as u64)
}

fn days_from_now_at_noon<Tz: TimeZone>(now: &DateTime<Tz>, days: u64) -> Option<Timestamp> {
    let date = now.date_naive().checked_add_days(Days::new(days))?;
    noon_on(date, &now.timezone())
}

fn noon_on<Tz: TimeZone>(date: NaiveDate, zone: &Tz) -> Option<Timestamp> {
    in_zone(date.and_hms_opt(12, 0, 0)?, zone)
}

/// Wall-clock time in `zone`; the earlier instant wins when clocks fall back
fn in_zone<Tz: TimeZone>(naive: NaiveDateTime, zone: &Tz) -> Option<Timestamp> {
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}
