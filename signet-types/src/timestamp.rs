//! Timezone-carrying instants with deterministic rendering.
//!
//! A `Timestamp` is always local to an explicit IANA zone; the zone only
//! affects display, never ordering.  Equality is within a 1 ms epsilon to
//! absorb serialization rounding, so only `PartialEq`/`PartialOrd` are
//! implemented (epsilon equality does not refine a total order).

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Duration, Error};

/// Two timestamps within this many microseconds compare equal.
pub const EPSILON_MICROS: i64 = 1_000;

/// An instant carrying an explicit display timezone.
#[derive(Debug, Clone, Copy)]
pub struct Timestamp {
    utc: DateTime<Utc>,
    zone: Tz,
}

impl Timestamp {
    /// The current instant, in UTC.
    #[must_use]
    pub fn now() -> Self {
        Self {
            utc: Utc::now(),
            zone: Tz::UTC,
        }
    }

    /// Wraps a UTC instant.
    #[must_use]
    pub fn from_utc(utc: DateTime<Utc>) -> Self {
        Self {
            utc,
            zone: Tz::UTC,
        }
    }

    /// Builds a timestamp from microseconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTimestamp`] when out of chrono's range.
    pub fn from_micros(micros: i64) -> Result<Self, Error> {
        DateTime::from_timestamp_micros(micros)
            .map(Self::from_utc)
            .ok_or_else(|| Error::InvalidTimestamp(format!("{micros}us since epoch")))
    }

    /// Parses a timestamp, defaulting naive forms to UTC.
    ///
    /// Accepted forms: `YYYY-MM-DD[ T]HH:MM[:SS[.ffffff]]` with an optional
    /// trailing numeric offset, `YYYY-MM-DD`, each optionally followed by a
    /// whitespace-separated IANA zone name (eg. `Canada/Mountain`).  An
    /// explicit numeric offset fixes the instant; the zone name then only
    /// selects the display zone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTimestamp`] or [`Error::UnknownZone`] with
    /// the offending literal.
    pub fn parse(text: &str) -> Result<Self, Error> {
        Self::parse_in(text, Tz::UTC)
    }

    /// Parses a timestamp, localizing naive forms to `default_zone`.
    ///
    /// # Errors
    ///
    /// See [`Timestamp::parse`].
    pub fn parse_in(text: &str, default_zone: Tz) -> Result<Self, Error> {
        let trimmed = text.trim();
        let (body, named) = split_zone(trimmed)?;
        let zone = named.unwrap_or(default_zone);

        for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
            if let Ok(fixed) = DateTime::parse_from_str(body, fmt) {
                return Ok(Self {
                    utc: fixed.with_timezone(&Utc),
                    zone,
                });
            }
        }

        let naive = parse_naive(body).ok_or_else(|| Error::InvalidTimestamp(text.to_string()))?;
        match zone.from_local_datetime(&naive) {
            LocalResult::Single(local) => Ok(Self {
                utc: local.with_timezone(&Utc),
                zone,
            }),
            // DST fall-back repeats an hour; take the earlier reading.
            LocalResult::Ambiguous(early, _) => Ok(Self {
                utc: early.with_timezone(&Utc),
                zone,
            }),
            LocalResult::None => Err(Error::InvalidTimestamp(format!(
                "{text} does not exist in zone {}",
                zone.name()
            ))),
        }
    }

    /// Microseconds since the Unix epoch.
    #[must_use]
    pub fn micros(&self) -> i64 {
        self.utc.timestamp_micros()
    }

    /// Fractional seconds since the Unix epoch.
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.micros() as f64 / 1_000_000.0
    }

    /// The display zone.
    #[must_use]
    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// The same instant with a different display zone.
    #[must_use]
    pub fn in_zone(&self, zone: Tz) -> Self {
        Self {
            utc: self.utc,
            zone,
        }
    }

    /// The canonical form embedded in signed bytes: UTC, whole seconds.
    ///
    /// Sub-second data is truncated; the 1 ms comparison epsilon absorbs
    /// the loss on round-trip.
    #[must_use]
    pub fn render_canonical(&self) -> String {
        let dt = self.utc;
        format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second()
        )
    }
}

/// Splits a trailing IANA zone name off `text`, when present.
fn split_zone(text: &str) -> Result<(&str, Option<Tz>), Error> {
    if let Some((body, last)) = text.rsplit_once(char::is_whitespace) {
        if last.chars().any(|c| c.is_ascii_alphabetic()) {
            let zone = last
                .parse::<Tz>()
                .map_err(|_| Error::UnknownZone(last.to_string()))?;
            return Ok((body.trim_end(), Some(zone)));
        }
    }
    Ok((text, None))
}

/// Parses the naive (zoneless) datetime forms.
fn parse_naive(body: &str) -> Option<NaiveDateTime> {
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(body, fmt) {
            return Some(naive);
        }
    }
    NaiveDate::parse_from_str(body, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

impl fmt::Display for Timestamp {
    /// Milliseconds and the zone name, in the value's own zone.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let local = self.utc.with_timezone(&self.zone);
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03} {}",
            local.year(),
            local.month(),
            local.day(),
            local.hour(),
            local.minute(),
            local.second(),
            local.timestamp_subsec_micros() / 1_000,
            self.zone.name()
        )
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        (self.micros() - other.micros()).abs() <= EPSILON_MICROS
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let delta = self.micros() - other.micros();
        if delta < -EPSILON_MICROS {
            Some(Ordering::Less)
        } else if delta > EPSILON_MICROS {
            Some(Ordering::Greater)
        } else {
            Some(Ordering::Equal)
        }
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp {
            utc: self.utc + rhs.to_chrono(),
            zone: self.zone,
        }
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp {
            utc: self.utc - rhs.to_chrono(),
            zone: self.zone,
        }
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        Duration::from_micros(self.micros() - rhs.micros())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render_canonical())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
