//! Human-readable durations, eg. `1y2w3d4h5m6.007s`.
//!
//! A year is defined as exactly 365.25 days and a week as exactly 7 days;
//! these are fixed constants chosen for human-scale license windows, not
//! calendar-accurate arithmetic.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

const US_PER_SEC: i64 = 1_000_000;

/// Seconds per year (365.25 days).
pub const YEAR_SECS: i64 = 31_557_600;
/// Seconds per week.
pub const WEEK_SECS: i64 = 604_800;
/// Seconds per day.
pub const DAY_SECS: i64 = 86_400;
/// Seconds per hour.
pub const HOUR_SECS: i64 = 3_600;
/// Seconds per minute.
pub const MINUTE_SECS: i64 = 60;

/// Signed elapsed time with microsecond resolution.
///
/// Round-trips through its human-readable form losing no more than
/// microsecond precision (nanosecond fields are floored on parse).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration {
    micros: i64,
}

/// Unit fields in the order the grammar admits them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Unit {
    Year,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Milli,
    Micro,
    Nano,
}

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Duration = Duration { micros: 0 };

    /// Creates a duration from a raw microsecond count.
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Creates a duration from whole seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self {
            micros: secs * US_PER_SEC,
        }
    }

    /// Creates a duration from fractional seconds, rounded to microseconds.
    #[must_use]
    pub fn from_secs_f64(secs: f64) -> Self {
        Self {
            micros: (secs * US_PER_SEC as f64).round() as i64,
        }
    }

    /// Returns the raw microsecond count.
    #[must_use]
    pub const fn as_micros(&self) -> i64 {
        self.micros
    }

    /// Returns the duration as fractional seconds.
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.micros as f64 / US_PER_SEC as f64
    }

    /// Returns true for the zero duration.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.micros == 0
    }

    /// Converts to a `chrono` time delta.
    #[must_use]
    pub fn to_chrono(&self) -> chrono::Duration {
        chrono::Duration::microseconds(self.micros)
    }

    /// Parses a duration specification such as `1y2w3d4h5m6.007s`.
    ///
    /// Fields must appear in strictly decreasing unit order; each unit
    /// accepts its common long forms (`year`, `weeks`, `min`, `sec`, …).
    /// Seconds may carry a decimal fraction (`6.007s`, `.5s`); separate
    /// `ms`/`us`/`ns` fields are also accepted, nanoseconds flooring to
    /// microseconds.  A leading `-` negates the whole specification.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDuration`] carrying the offending literal.
    pub fn parse(spec: &str) -> Result<Self, Error> {
        let bad = || Error::InvalidDuration(spec.to_string());
        let trimmed = spec.trim();
        let (negative, mut rest) = match trimmed.strip_prefix('-') {
            Some(tail) => (true, tail.trim_start()),
            None => (false, trimmed),
        };
        if rest.is_empty() {
            return Err(bad());
        }

        let mut micros: i64 = 0;
        let mut last: Option<Unit> = None;
        while !rest.trim_start().is_empty() {
            rest = rest.trim_start();
            let (mantissa, fraction, tail) = take_number(rest).ok_or_else(bad)?;
            let (unit, tail) = take_unit(tail.trim_start()).ok_or_else(bad)?;
            rest = tail;

            // Fields must be strictly decreasing; fractions only on seconds.
            if last.is_some_and(|prev| prev >= unit) {
                return Err(bad());
            }
            if fraction.is_some() && unit != Unit::Second {
                return Err(bad());
            }
            last = Some(unit);

            let value: i64 = match mantissa {
                "" => 0,
                digits => digits.parse().map_err(|_| bad())?,
            };
            let field_us = match unit {
                Unit::Year => value.checked_mul(YEAR_SECS * US_PER_SEC),
                Unit::Week => value.checked_mul(WEEK_SECS * US_PER_SEC),
                Unit::Day => value.checked_mul(DAY_SECS * US_PER_SEC),
                Unit::Hour => value.checked_mul(HOUR_SECS * US_PER_SEC),
                Unit::Minute => value.checked_mul(MINUTE_SECS * US_PER_SEC),
                Unit::Second => value.checked_mul(US_PER_SEC),
                Unit::Milli => value.checked_mul(1_000),
                Unit::Micro => Some(value),
                Unit::Nano => Some(value / 1_000),
            }
            .ok_or_else(|| Error::DurationRange(spec.to_string()))?;
            micros = micros
                .checked_add(field_us)
                .ok_or_else(|| Error::DurationRange(spec.to_string()))?;

            if let Some(frac) = fraction {
                // Right-pad to microsecond digits: ".007" -> 7000us.
                let mut padded = frac.to_string();
                padded.truncate(6);
                while padded.len() < 6 {
                    padded.push('0');
                }
                let frac_us: i64 = padded.parse().map_err(|_| bad())?;
                micros = micros
                    .checked_add(frac_us)
                    .ok_or_else(|| Error::DurationRange(spec.to_string()))?;
            }
        }
        if last.is_none() {
            return Err(bad());
        }

        Ok(Self {
            micros: if negative { -micros } else { micros },
        })
    }

    /// Formats via greedy decomposition into y/w/d/h/m and a seconds field.
    fn render(&self) -> String {
        let total = self.micros.unsigned_abs();
        let seconds = (total / US_PER_SEC as u64) as i64;
        let micros = (total % US_PER_SEC as u64) as i64;

        let mut out = String::new();
        if self.micros < 0 {
            out.push('-');
        }

        let years = seconds / YEAR_SECS;
        if years > 0 {
            out.push_str(&format!("{years}y"));
        }
        let y_rem = seconds % YEAR_SECS;
        let weeks = y_rem / WEEK_SECS;
        if weeks > 0 {
            out.push_str(&format!("{weeks}w"));
        }
        let w_rem = y_rem % WEEK_SECS;
        let days = w_rem / DAY_SECS;
        if days > 0 {
            out.push_str(&format!("{days}d"));
        }
        let d_rem = w_rem % DAY_SECS;
        let hours = d_rem / HOUR_SECS;
        if hours > 0 {
            out.push_str(&format!("{hours}h"));
        }
        let h_rem = d_rem % HOUR_SECS;
        let minutes = h_rem / MINUTE_SECS;
        if minutes > 0 {
            out.push_str(&format!("{minutes}m"));
        }

        let secs = h_rem % MINUTE_SECS;
        let has_us = micros % 1_000 > 0;
        let has_ms = micros / 1_000 > 0;
        if has_ms && (secs > 0 || has_us) {
            // Mixed resolution; render as a trimmed decimal fraction.
            let frac = format!("{micros:06}");
            out.push_str(&format!("{secs}.{}", frac.trim_end_matches('0')));
            out.push('s');
        } else if micros > 0 || secs > 0 {
            // Auto-scale to the finest resolution with data.
            if secs > 0 {
                out.push_str(&format!("{secs}s"));
            }
            if has_us {
                out.push_str(&format!("{micros}us"));
            } else if has_ms {
                out.push_str(&format!("{}ms", micros / 1_000));
            }
        } else if self.micros == 0 {
            out.push_str("0s");
        }
        out
    }
}

/// Splits a leading number with optional decimal fraction off `input`.
///
/// Returns `(mantissa, fraction, rest)`; at least one digit must be present
/// across mantissa and fraction.  Both `.` and `,` delimit a fraction.
fn take_number(input: &str) -> Option<(&str, Option<&str>, &str)> {
    let mantissa_end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (mantissa, rest) = input.split_at(mantissa_end);
    let (fraction, rest) = if rest.starts_with(['.', ',']) {
        let tail = &rest[1..];
        let frac_end = tail
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(tail.len());
        if frac_end == 0 {
            return None;
        }
        let (frac, tail) = tail.split_at(frac_end);
        (Some(frac), tail)
    } else {
        (None, rest)
    };
    if mantissa.is_empty() && fraction.is_none() {
        return None;
    }
    Some((mantissa, fraction, rest))
}

/// Splits a leading unit token off `input` and maps it to a [`Unit`].
fn take_unit(input: &str) -> Option<(Unit, &str)> {
    let end = input
        .find(|c: char| !(c.is_alphabetic()))
        .unwrap_or(input.len());
    if end == 0 {
        return None;
    }
    let (token, rest) = input.split_at(end);
    let unit = match token.to_lowercase().as_str() {
        "y" | "yr" | "yrs" | "year" | "years" => Unit::Year,
        "w" | "wk" | "wks" | "week" | "weeks" => Unit::Week,
        "d" | "dy" | "dys" | "day" | "days" => Unit::Day,
        "h" | "hr" | "hrs" | "hour" | "hours" => Unit::Hour,
        "m" | "min" | "mins" | "minute" | "minutes" => Unit::Minute,
        "s" | "sec" | "secs" | "second" | "seconds" => Unit::Second,
        "ms" | "msec" | "msecs" | "milli" | "millis" | "millisecond" | "milliseconds" => {
            Unit::Milli
        }
        "us" | "μs" | "usec" | "usecs" | "micro" | "micros" | "microsecond" | "microseconds" => {
            Unit::Micro
        }
        "ns" | "nsec" | "nsecs" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => Unit::Nano,
        _ => return None,
    };
    Some((unit, rest))
}

/// Converts seconds in any accepted notation to fractional seconds.
///
/// Accepts a bare float (`"1.23"`), a clock form (`"HHH:MM[:SS[.sss]]"`),
/// or a duration literal (`"1m30s"`).
///
/// # Errors
///
/// Returns [`Error::InvalidDuration`] when no notation matches.
pub fn parse_seconds(text: &str) -> Result<f64, Error> {
    let trimmed = text.trim();
    if let Ok(secs) = trimmed.parse::<f64>() {
        return Ok(secs);
    }
    if let Some(secs) = parse_clock(trimmed) {
        return Ok(secs);
    }
    Duration::parse(trimmed).map(|d| d.as_secs_f64())
}

/// Parses `HHH:MM[:SS[.sss]]` clock notation.
fn parse_clock(text: &str) -> Option<f64> {
    let mut parts = text.split(':');
    let hours = parts.next()?;
    let minutes = parts.next()?;
    let seconds = parts.next();
    if parts.next().is_some() {
        return None;
    }
    let hours: f64 = if hours.is_empty() {
        0.0
    } else {
        hours.parse().ok()?
    };
    if minutes.len() != 2 || !minutes.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = match seconds {
        None => 0.0,
        Some(s) => s.parse().ok()?,
    };
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration::from_micros(self.micros + rhs.micros)
    }
}

impl Sub for Duration {
    type Output = Duration;

    fn sub(self, rhs: Duration) -> Duration {
        Duration::from_micros(self.micros - rhs.micros)
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration::from_micros(-self.micros)
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
