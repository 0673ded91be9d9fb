use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;

use crate::error::ConfigurationError;

/// A configured time zone: either a fixed UTC offset or an IANA zone whose
/// offset follows daylight-saving rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZoneSpec {
    Fixed(FixedOffset),
    Named(Tz),
}

impl TimeZoneSpec {
    pub fn utc() -> Self {
        TimeZoneSpec::Fixed(Utc.fix())
    }

    /// IANA name for named zones, `+HH:MM` for fixed offsets
    pub fn name(&self) -> String {
        match self {
            TimeZoneSpec::Fixed(offset) => offset.to_string(),
            TimeZoneSpec::Named(tz) => tz.name().to_string(),
        }
    }

    pub fn fixed_offset(&self) -> Option<FixedOffset> {
        match self {
            TimeZoneSpec::Fixed(offset) => Some(*offset),
            TimeZoneSpec::Named(_) => None,
        }
    }

    /// The instant `utc` as seen in this zone
    pub fn from_utc(&self, utc: &DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            TimeZoneSpec::Fixed(offset) => utc.with_timezone(offset),
            TimeZoneSpec::Named(tz) => {
                let local = utc.with_timezone(tz);
                local.with_timezone(&local.offset().fix())
            }
        }
    }

    /// Resolves a wall-clock time in this zone.
    ///
    /// An ambiguous time (clocks turned back) resolves to the earlier instant.
    /// A time skipped by a daylight-saving jump does not exist and yields `None`.
    pub fn from_local(&self, local: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            TimeZoneSpec::Fixed(offset) => offset.from_local_datetime(local).single(),
            TimeZoneSpec::Named(tz) => tz
                .from_local_datetime(local)
                .earliest()
                .map(|instant| instant.with_timezone(&instant.offset().fix())),
        }
    }
}

impl Default for TimeZoneSpec {
    fn default() -> Self {
        TimeZoneSpec::utc()
    }
}

impl From<FixedOffset> for TimeZoneSpec {
    fn from(offset: FixedOffset) -> Self {
        TimeZoneSpec::Fixed(offset)
    }
}

impl From<Tz> for TimeZoneSpec {
    fn from(tz: Tz) -> Self {
        TimeZoneSpec::Named(tz)
    }
}

impl fmt::Display for TimeZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Parses a time zone given as a UTC offset or an IANA name.
///
/// Accepted offset forms: `UTC`, `GMT`, `Z`, `+03:00`, `-0530`, `+3`, with an
/// optional `UTC` prefix (`UTC+02:00`). Anything else is looked up in the IANA
/// database (`Europe/Moscow`, `America/New_York`).
pub fn parse_time_zone(value: &str) -> Result<TimeZoneSpec, ConfigurationError> {
    let trimmed = value.trim();
    if let Some(offset) = parse_offset(trimmed) {
        return Ok(TimeZoneSpec::Fixed(offset));
    }
    trimmed
        .parse::<Tz>()
        .map(TimeZoneSpec::Named)
        .map_err(|_| ConfigurationError::InvalidTimeZone(value.to_string()))
}

fn parse_offset(value: &str) -> Option<FixedOffset> {
    let upper = value.to_ascii_uppercase();
    if matches!(upper.as_str(), "UTC" | "GMT" | "Z") {
        return FixedOffset::east_opt(0);
    }

    let offset = upper
        .strip_prefix("UTC")
        .or_else(|| upper.strip_prefix("GMT"))
        .unwrap_or(&upper);

    let (sign, digits) = if let Some(rest) = offset.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = offset.strip_prefix('-') {
        (-1, rest)
    } else {
        return None;
    };
    if !digits.is_ascii() {
        return None;
    }

    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h, m),
        None if digits.len() == 4 => digits.split_at(2),
        None => (digits, "0"),
    };

    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
