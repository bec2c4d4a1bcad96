// crates/update-gate-core/src/core/time.rs
// ============================================================================
// Module: Update Gate Time Model
// Description: Canonical timestamp representation for updates, certificates, and logs.
// Purpose: Keep trust and launch decisions deterministic by passing time explicitly.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Update Gate uses explicit unix-millisecond timestamps for manifest creation
//! times, certificate validity checks, and audit records. Trust and launch
//! logic never reads wall-clock time directly; hosts supply a [`Timestamp`]
//! or inject a clock through the runtime interfaces.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when converting between timestamp representations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Input was not a valid RFC 3339 timestamp.
    #[error("invalid rfc3339 timestamp: {0}")]
    Parse(String),
    /// Timestamp does not fit the supported range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
}

// ============================================================================
// SECTION: Time Values
// ============================================================================

/// Canonical timestamp in unix epoch milliseconds.
///
/// # Invariants
/// - Values are explicitly provided by callers; trust and launch logic never reads
///   wall-clock time.
/// - Ordering follows the underlying millisecond value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from unix epoch milliseconds.
    #[must_use]
    pub const fn from_unix_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as unix epoch milliseconds.
    #[must_use]
    pub const fn as_unix_millis(self) -> i64 {
        self.0
    }

    /// Reads the current wall-clock time.
    ///
    /// Only hosts and clock implementations call this; core decisions take
    /// timestamps as parameters.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self(millis)
    }

    /// Parses an RFC 3339 timestamp such as `2024-03-01T12:00:00.000Z`.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::Parse`] when the input is not RFC 3339 and
    /// [`TimeError::OutOfRange`] when it cannot be represented in milliseconds.
    pub fn parse_rfc3339(value: &str) -> Result<Self, TimeError> {
        let parsed = OffsetDateTime::parse(value, &Rfc3339)
            .map_err(|err| TimeError::Parse(format!("{value}: {err}")))?;
        Self::from_offset_date_time(parsed)
    }

    /// Converts an [`OffsetDateTime`] into a millisecond timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::OutOfRange`] when the value does not fit in `i64` millis.
    pub fn from_offset_date_time(value: OffsetDateTime) -> Result<Self, TimeError> {
        let millis = value.unix_timestamp_nanos() / 1_000_000;
        i64::try_from(millis)
            .map(Self)
            .map_err(|_| TimeError::OutOfRange(value.to_string()))
    }

    /// Formats the timestamp as RFC 3339.
    ///
    /// # Errors
    ///
    /// Returns [`TimeError::OutOfRange`] when the value is outside the calendar range.
    pub fn to_rfc3339(self) -> Result<String, TimeError> {
        let nanos = i128::from(self.0) * 1_000_000;
        let value = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|err| TimeError::OutOfRange(err.to_string()))?;
        value.format(&Rfc3339).map_err(|err| TimeError::OutOfRange(err.to_string()))
    }

    /// Returns a timestamp shifted by the given number of milliseconds, saturating.
    #[must_use]
    pub const fn saturating_add_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_add(millis))
    }

    /// Returns a timestamp shifted back by the given number of milliseconds, saturating.
    #[must_use]
    pub const fn saturating_sub_millis(self, millis: i64) -> Self {
        Self(self.0.saturating_sub(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
