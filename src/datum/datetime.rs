//! `xs:dateTime` literals to epoch milliseconds.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static OFFSET_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Z|[+-]\d{2}:\d{2})$").expect("offset pattern compiles"));

/// Zone applied to date-times whose literal carries no offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultZone {
    #[default]
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
}

impl FromStr for DefaultZone {
    type Err = Error;

    /// `UTC`, `Z`, `+HH:MM`/`-HH:MM`, or an IANA zone name.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("utc") || s == "Z" {
            return Ok(DefaultZone::Utc);
        }
        if s.starts_with(['+', '-']) {
            return parse_offset(s, s).map(DefaultZone::Fixed);
        }
        s.parse::<Tz>()
            .map(DefaultZone::Named)
            .map_err(|e| Error::value_parse("timezone", s, e))
    }
}

impl fmt::Display for DefaultZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultZone::Utc => f.write_str("UTC"),
            DefaultZone::Fixed(offset) => write!(f, "{offset}"),
            DefaultZone::Named(tz) => f.write_str(tz.name()),
        }
    }
}

/// Parse a date-time literal into epoch milliseconds.
///
/// Literals without a `T` are taken as a plain epoch-millisecond count.
/// An offset in the literal overrides `zone`. Sub-millisecond digits are
/// truncated.
pub fn parse_timestamp_millis(literal: &str, zone: &DefaultZone) -> Result<i64> {
    let text = literal.trim();
    if !text.contains('T') {
        return text.parse::<i64>().map_err(|e| Error::value_parse("long", text, e));
    }

    let (local, offset) = match OFFSET_SUFFIX.find(text) {
        Some(m) => (&text[..m.start()], Some(parse_offset(m.as_str(), text)?)),
        None => (text, None),
    };
    let format = if local.contains('.') { "%Y-%m-%dT%H:%M:%S%.f" } else { "%Y-%m-%dT%H:%M:%S" };
    let naive = NaiveDateTime::parse_from_str(local, format).map_err(|e| Error::value_parse("dateTime", text, e))?;

    match (offset, zone) {
        (Some(offset), _) => resolve(offset.from_local_datetime(&naive), text),
        (None, DefaultZone::Utc) => Ok(Utc.from_utc_datetime(&naive).timestamp_millis()),
        (None, DefaultZone::Fixed(offset)) => resolve(offset.from_local_datetime(&naive), text),
        (None, DefaultZone::Named(tz)) => resolve(tz.from_local_datetime(&naive), text),
    }
}

fn resolve<Z: TimeZone>(local: LocalResult<DateTime<Z>>, literal: &str) -> Result<i64> {
    match local {
        LocalResult::Single(at) => Ok(at.timestamp_millis()),
        // fall-back transitions repeat an hour; take the earlier instant
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.timestamp_millis()),
        LocalResult::None => Err(Error::value_parse("dateTime", literal, "local time does not exist in the zone")),
    }
}

fn parse_offset(suffix: &str, literal: &str) -> Result<FixedOffset> {
    let invalid = || Error::value_parse("dateTime", literal, format!("invalid offset `{suffix}`"));
    if suffix == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }
    let sign = match suffix.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(invalid()),
    };
    let (hours, minutes) = suffix[1..].split_once(':').ok_or_else(invalid)?;
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
