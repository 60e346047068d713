//! Timestamp type and its resolver.
//!
//! A timestamp is a count of 100-nanosecond ticks since 0001-01-01T00:00:00
//! plus a kind discriminant, laid out as:
//!
//! ```text
//! +----------------+-----------+
//! | ticks (i64 LE) | kind (i32)|
//! | 8 bytes        | 4 bytes   |
//! +----------------+-----------+
//! ```

use crate::error::BufferError;
use crate::reader::BufferReader;
use crate::registry::FixedResolver;
use crate::writer::BufferWriter;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoded width of a [`Timestamp`].
pub const TIMESTAMP_WIDTH: usize = 12;

const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks at 1970-01-01T00:00:00.
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Ticks at 9999-12-31T23:59:59.9999999.
const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

/// How a timestamp's ticks relate to UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i32)]
pub enum TimestampKind {
    #[default]
    Unspecified = 0,
    Utc = 1,
    Local = 2,
}

impl TryFrom<i32> for TimestampKind {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TimestampKind::Unspecified),
            1 => Ok(TimestampKind::Utc),
            2 => Ok(TimestampKind::Local),
            other => Err(other),
        }
    }
}

/// Tick-based timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    ticks: i64,
    kind: TimestampKind,
}

impl Timestamp {
    pub const fn new(ticks: i64, kind: TimestampKind) -> Self {
        Self { ticks, kind }
    }

    pub const fn from_ticks(ticks: i64) -> Self {
        Self::new(ticks, TimestampKind::Unspecified)
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Converts a UTC datetime, truncating to 100ns precision.
    /// Dates outside the tick range saturate and fail validation on write.
    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        let ticks = value
            .timestamp()
            .saturating_mul(TICKS_PER_SECOND)
            .saturating_add(UNIX_EPOCH_TICKS)
            .saturating_add((value.timestamp_subsec_nanos() / 100) as i64);
        Self::new(ticks, TimestampKind::Utc)
    }

    /// Interprets the ticks as UTC, regardless of kind.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if !self.is_valid() {
            return None;
        }
        let relative = self.ticks - UNIX_EPOCH_TICKS;
        let secs = relative.div_euclid(TICKS_PER_SECOND);
        let nanos = (relative.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }

    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    pub fn kind(&self) -> TimestampKind {
        self.kind
    }

    /// Whether the ticks fall inside 0001-01-01 ..= 9999-12-31.
    pub fn is_valid(&self) -> bool {
        (0..=MAX_TICKS).contains(&self.ticks)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{} ({:?})", dt.to_rfc3339(), self.kind),
            None => write!(f, "{} ticks ({:?})", self.ticks, self.kind),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_datetime(value)
    }
}

fn invalid(reason: String) -> BufferError {
    BufferError::InvalidEncoding {
        type_name: std::any::type_name::<Timestamp>(),
        reason,
    }
}

/// Fixed resolver for [`Timestamp`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampResolver;

impl FixedResolver<Timestamp> for TimestampResolver {
    fn width(&self) -> usize {
        TIMESTAMP_WIDTH
    }

    fn write(&self, writer: &mut BufferWriter<'_>, value: &Timestamp) -> Result<(), BufferError> {
        if !value.is_valid() {
            return Err(invalid(format!("ticks out of range: {}", value.ticks)));
        }
        writer.write(&value.ticks)?;
        writer.write(&(value.kind as i32))
    }

    fn read(&self, reader: &mut BufferReader<'_>) -> Result<Timestamp, BufferError> {
        let ticks = reader.read::<i64>()?;
        let kind = reader.read::<i32>()?;

        let kind = TimestampKind::try_from(kind)
            .map_err(|k| invalid(format!("unknown timestamp kind: {}", k)))?;
        let value = Timestamp::new(ticks, kind);
        if !value.is_valid() {
            return Err(invalid(format!("ticks out of range: {}", ticks)));
        }
        Ok(value)
    }
}
