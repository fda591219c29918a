//! Time-range planning: splits the migration window into shard ranges.
//!
//! Fixed-duration units (`minute`, `hour`, `day`, `week`) place boundaries at
//! `start + k * unit`. Calendar units (`month`, `year`) place boundaries at the
//! first instant of each following month/year in the UTC offset of `start`.
//! The last range is truncated to `end`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::core::TimeRange;
use crate::error::{MigrateError, Result};

/// Unit used to split the global window into shard-sized ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkSpec {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl ChunkSpec {
    /// Whether boundaries follow the calendar rather than a fixed duration.
    pub fn is_calendar(&self) -> bool {
        matches!(self, ChunkSpec::Month | ChunkSpec::Year)
    }

    fn fixed_duration(&self) -> Option<chrono::Duration> {
        match self {
            ChunkSpec::Minute => Some(chrono::Duration::minutes(1)),
            ChunkSpec::Hour => Some(chrono::Duration::hours(1)),
            ChunkSpec::Day => Some(chrono::Duration::days(1)),
            ChunkSpec::Week => Some(chrono::Duration::weeks(1)),
            ChunkSpec::Month | ChunkSpec::Year => None,
        }
    }

    /// First boundary strictly after `t`.
    fn next_boundary(&self, t: DateTime<FixedOffset>) -> Result<DateTime<FixedOffset>> {
        if let Some(step) = self.fixed_duration() {
            return t.checked_add_signed(step).ok_or_else(|| out_of_range(&t));
        }

        let (year, month) = match self {
            ChunkSpec::Month if t.month() == 12 => (t.year() + 1, 1),
            ChunkSpec::Month => (t.year(), t.month() + 1),
            _ => (t.year() + 1, 1),
        };
        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .and_then(|naive| t.offset().from_local_datetime(&naive).single())
            .ok_or_else(|| out_of_range(&t))
    }
}

impl FromStr for ChunkSpec {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minute" => Ok(ChunkSpec::Minute),
            "hour" => Ok(ChunkSpec::Hour),
            "day" => Ok(ChunkSpec::Day),
            "week" => Ok(ChunkSpec::Week),
            "month" => Ok(ChunkSpec::Month),
            "year" => Ok(ChunkSpec::Year),
            _ => Err(MigrateError::InvalidChunkSpec(s.to_string())),
        }
    }
}

impl fmt::Display for ChunkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkSpec::Minute => "minute",
            ChunkSpec::Hour => "hour",
            ChunkSpec::Day => "day",
            ChunkSpec::Week => "week",
            ChunkSpec::Month => "month",
            ChunkSpec::Year => "year",
        };
        f.write_str(name)
    }
}

/// Split `[start, end)` using a textual chunk spec. An empty spec yields the
/// single range `[start, end)`.
pub fn split_date_range(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    chunk: &str,
) -> Result<Vec<TimeRange>> {
    if chunk.trim().is_empty() {
        check_order(&start, &end)?;
        return Ok(vec![TimeRange::new(start, end)]);
    }
    split(start, end, chunk.parse()?)
}

/// Split `[start, end)` into ascending, contiguous, non-empty ranges.
pub fn split(
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    chunk: ChunkSpec,
) -> Result<Vec<TimeRange>> {
    check_order(&start, &end)?;

    let mut ranges = Vec::new();
    let mut current = start;
    while current < end {
        let next = chunk.next_boundary(current)?.min(end);
        ranges.push(TimeRange::new(current, next));
        current = next;
    }
    Ok(ranges)
}

fn check_order(start: &DateTime<FixedOffset>, end: &DateTime<FixedOffset>) -> Result<()> {
    if start >= end {
        return Err(MigrateError::InvalidTimeRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok(())
}

fn out_of_range(t: &DateTime<FixedOffset>) -> MigrateError {
    MigrateError::Config(format!("chunk boundary after {} is out of range", t.to_rfc3339()))
}
