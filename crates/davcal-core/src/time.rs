//! Time values carried by calendar objects.
//!
//! [`CalendarTime`] keeps a start/end/due value exactly in the form it was
//! given: an all-day date, a UTC instant, a floating local time, or a local
//! time bound to a named timezone. Nothing here converts between zones.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A date or date-time value as it appears on a calendar object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CalendarTime {
    /// An all-day date (no time component).
    Date(NaiveDate),
    /// An absolute instant in UTC.
    Utc(DateTime<Utc>),
    /// A local wall-clock time with no timezone attached.
    Floating(NaiveDateTime),
    /// A local wall-clock time in the named timezone.
    Zoned {
        /// The local date-time.
        date_time: NaiveDateTime,
        /// Timezone identifier (e.g. `Asia/Shanghai`).
        tzid: String,
    },
}

impl CalendarTime {
    /// Creates a UTC calendar time.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::Utc(dt)
    }

    /// Creates an all-day calendar time.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::Date(date)
    }

    /// Creates a local time bound to a timezone identifier.
    pub fn zoned(date_time: NaiveDateTime, tzid: impl Into<String>) -> Self {
        Self::Zoned {
            date_time,
            tzid: tzid.into(),
        }
    }

    /// Parses an ISO 8601 value as typed on a command line.
    ///
    /// Accepted forms:
    /// - `2024-06-01` (all-day)
    /// - `2024-06-01T09:00:00Z` / `2024-06-01T09:00:00+08:00` (instant)
    /// - `2024-06-01T09:00:00` / `2024-06-01T09:00` (floating)
    ///
    /// A numeric offset carries no timezone name, so the value becomes the
    /// same instant in UTC: `17:00+08:00` is stored and shown as `09:00Z`.
    /// Use [`CalendarTime::zoned`] to keep a local time bound to a TZID.
    pub fn parse_iso(s: &str) -> Option<Self> {
        let s = s.trim();

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::Date(date));
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(Self::Utc(dt.with_timezone(&Utc)));
        }

        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(Self::Floating)
    }

    /// Returns `true` for all-day values.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Date(_))
    }

    /// Returns the UTC instant if this value is one.
    pub fn as_utc(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Utc(dt) => Some(dt),
            _ => None,
        }
    }

    /// Returns the timezone identifier of a zoned value.
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Zoned { tzid, .. } => Some(tzid),
            _ => None,
        }
    }
}

impl From<DateTime<Utc>> for CalendarTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Utc(dt)
    }
}

impl From<NaiveDate> for CalendarTime {
    fn from(date: NaiveDate) -> Self {
        Self::Date(date)
    }
}

impl fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Utc(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Floating(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Self::Zoned { date_time, tzid } => {
                write!(f, "{}[{}]", date_time.format("%Y-%m-%dT%H:%M:%S"), tzid)
            }
        }
    }
}
