//! Temporal value types and canonical encoding for Signet.
//!
//! This crate defines the fundamental, license-agnostic types the rest of
//! the workspace is built on:
//! - `Duration`: signed elapsed time with microsecond resolution and a
//!   human-readable form (`1y2w3d4h5m6.007s`)
//! - `Timestamp`: an instant that always carries an explicit timezone
//! - `Timespan`: an optional start plus optional length, with intersection
//! - `canonical`: the deterministic text encoding used as signing payload
//!
//! Everything here is a pure value type; no I/O, no ambient state.

pub mod canonical;
mod duration;
mod timespan;
mod timestamp;

pub use duration::{parse_seconds, Duration};
pub use timespan::Timespan;
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing or encoding values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The duration literal did not match the accepted grammar.
    #[error("invalid duration specification: {0:?}")]
    InvalidDuration(String),

    /// The duration would overflow the representable range.
    #[error("duration out of range: {0:?}")]
    DurationRange(String),

    /// The timestamp literal did not match any accepted format.
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    /// A timezone name that is not in the IANA database.
    #[error("unknown timezone: {0:?}")]
    UnknownZone(String),

    /// Structural serialization failed before canonical encoding.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
