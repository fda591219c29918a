//! Filter, time range and shard value types.

use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

/// Half-open time interval `[start, end)`.
///
/// Timestamps keep the UTC offset they were parsed with so calendar-aligned
/// chunking happens in the caller's time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeRange {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_rfc3339(&self.start), format_rfc3339(&self.end))
    }
}

/// Export filter sent to the source for a single request.
///
/// `match_expr` is an opaque series selector; this crate only merges a metric
/// name into it (see [`crate::core::matcher`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub match_expr: String,
    pub time_start: Option<DateTime<FixedOffset>>,
    pub time_end: Option<DateTime<FixedOffset>>,
}

impl Filter {
    /// Filter over an explicit time range.
    pub fn with_range(match_expr: impl Into<String>, range: TimeRange) -> Self {
        Self {
            match_expr: match_expr.into(),
            time_start: Some(range.start),
            time_end: Some(range.end),
        }
    }

    /// Wire query parameters: `match[]`, `start`, `end` (RFC3339).
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("match[]", self.match_expr.clone())];
        if let Some(start) = &self.time_start {
            params.push(("start", format_rfc3339(start)));
        }
        if let Some(end) = &self.time_end {
            params.push(("end", format_rfc3339(end)));
        }
        params
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "match[]={}", self.match_expr)?;
        if let Some(start) = &self.time_start {
            write!(f, " start={}", format_rfc3339(start))?;
        }
        if let Some(end) = &self.time_end {
            write!(f, " end={}", format_rfc3339(end))?;
        }
        Ok(())
    }
}

/// One unit of migration work: one metric over one time range, resolved into
/// a concrete filter and the endpoint URLs for the current tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub metric: String,
    pub tenant: String,
    pub filter: Filter,
    pub src_url: String,
    pub dst_url: String,
}

/// Format a timestamp as RFC3339 with second precision, keeping its offset.
pub fn format_rfc3339(ts: &DateTime<FixedOffset>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_query_params_include_range() {
        let filter = Filter::with_range(
            "{__name__=\"up\"}",
            TimeRange::new(ts("2024-01-01T00:00:00Z"), ts("2024-01-02T00:00:00Z")),
        );
        let params = filter.query_params();
        assert_eq!(params[0], ("match[]", "{__name__=\"up\"}".to_string()));
        assert_eq!(params[1], ("start", "2024-01-01T00:00:00Z".to_string()));
        assert_eq!(params[2], ("end", "2024-01-02T00:00:00Z".to_string()));
    }

    #[test]
    fn test_format_keeps_offset() {
        assert_eq!(
            format_rfc3339(&ts("2024-03-01T10:00:00+02:00")),
            "2024-03-01T10:00:00+02:00"
        );
    }

    #[test]
    fn test_open_filter_omits_missing_bounds() {
        let filter = Filter {
            match_expr: "{job=\"a\"}".into(),
            time_start: Some(ts("2024-01-01T00:00:00Z")),
            time_end: None,
        };
        assert_eq!(filter.query_params().len(), 2);
        assert_eq!(
            filter.to_string(),
            "match[]={job=\"a\"} start=2024-01-01T00:00:00Z"
        );
    }
}
