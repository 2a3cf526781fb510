//! Validity windows: an optional start plus an optional length.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{canonical, Duration, Timestamp};

/// A validity window.
///
/// A `None` start means "unbounded past / immediately"; a `None` length
/// means "unbounded future".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Timespan {
    /// When the window opens; `None` is unbounded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub start: Option<Timestamp>,
    /// How long the window stays open; `None` is unbounded.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub length: Option<Duration>,
}

impl Timespan {
    /// A fully unbounded window (the identity under intersection).
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            start: None,
            length: None,
        }
    }

    /// A window with both bounds given.
    #[must_use]
    pub const fn new(start: Option<Timestamp>, length: Option<Duration>) -> Self {
        Self { start, length }
    }

    /// An open-ended window from `start`.
    #[must_use]
    pub const fn from_start(start: Timestamp) -> Self {
        Self {
            start: Some(start),
            length: None,
        }
    }

    /// When the window opens.
    #[must_use]
    pub fn begun(&self) -> Option<Timestamp> {
        self.start
    }

    /// When the window closes, when both bounds are known.
    #[must_use]
    pub fn ended(&self) -> Option<Timestamp> {
        match (self.start, self.length) {
            (Some(start), Some(length)) => Some(start + length),
            _ => None,
        }
    }

    /// True when neither bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.length.is_none()
    }

    /// True when `at` falls inside the window (start inclusive, end
    /// exclusive; missing bounds admit everything on that side).
    #[must_use]
    pub fn contains(&self, at: Timestamp) -> bool {
        if let Some(start) = self.start {
            if at.micros() < start.micros() {
                return false;
            }
        }
        if let Some(ended) = self.ended() {
            if at.micros() >= ended.micros() {
                return false;
            }
        }
        true
    }

    /// Intersects two windows: the merged start is the later of the defined
    /// starts, the merged end the earlier of the defined ends.
    ///
    /// Returns `None` when the windows are disjoint.  Intersection is
    /// associative and commutative, and the unbounded window is the
    /// identity.  When no absolute end bound exists, the shorter of the
    /// defined (floating) lengths is carried through.
    #[must_use]
    pub fn intersect(&self, other: &Timespan) -> Option<Timespan> {
        let start = match (self.start, other.start) {
            (Some(a), Some(b)) => Some(if a.micros() >= b.micros() { a } else { b }),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        let ended = match (self.ended(), other.ended()) {
            (Some(a), Some(b)) => Some(if a.micros() <= b.micros() { a } else { b }),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        if let (Some(s), Some(e)) = (start, ended) {
            if s.micros() > e.micros() {
                return None;
            }
        }
        let length = match (start, ended) {
            (Some(s), Some(e)) => Some(e - s),
            _ => match (self.length, other.length) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (Some(a), None) => Some(a),
                (None, b) => b,
            },
        };
        Some(Timespan { start, length })
    }

    /// A human-readable description for diagnostics, eg.
    /// `from 2021-09-29 00:00:00 UTC for 1w`.
    #[must_use]
    pub fn describe(&self) -> String {
        let from = match self.start {
            Some(start) => format!("from {}", start.render_canonical()),
            None => "from inception".to_string(),
        };
        let span = match self.length {
            Some(length) => format!("for {length}"),
            None => "indefinitely".to_string(),
        };
        format!("{from} {span}")
    }
}

impl fmt::Display for Timespan {
    /// The canonical JSON form (sorted keys, 4-space indent).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = serde_json::to_value(self).map_err(|_| fmt::Error)?;
        f.write_str(&canonical::encode(&value))
    }
}
