//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use chrono::{DateTime, FixedOffset, Utc};

use crate::core::TimeRange;
use crate::error::{MigrateError, Result};
use crate::planner;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Self::load_unvalidated(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file without validating it.
    ///
    /// Callers that apply overrides afterwards must call [`Config::validate`].
    pub fn load_unvalidated<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Resolve the global migration window.
    ///
    /// A missing end defaults to now, expressed in the start's UTC offset.
    pub fn time_window(&self) -> Result<TimeRange> {
        let start = parse_rfc3339("filter.time_start", &self.filter.time_start)?;
        let end = match self.filter.time_end.as_deref().map(str::trim) {
            Some(end) if !end.is_empty() => parse_rfc3339("filter.time_end", end)?,
            _ => Utc::now().with_timezone(start.offset()),
        };
        Ok(TimeRange::new(start, end))
    }

    /// Split the global window according to `filter.chunk`.
    pub fn time_ranges(&self) -> Result<Vec<TimeRange>> {
        self.time_ranges_in(&self.time_window()?)
    }

    /// Split an already resolved `window` according to `filter.chunk`.
    pub fn time_ranges_in(&self, window: &TimeRange) -> Result<Vec<TimeRange>> {
        planner::split_date_range(
            window.start,
            window.end,
            self.filter.chunk.as_deref().unwrap_or(""),
        )
    }
}

fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|e| {
        MigrateError::Config(format!(
            "failed to parse {}, provided: {}, expected format: RFC3339 (e.g. 2024-01-01T00:00:00Z), error: {}",
            field, value, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
source:
  addr: http://src:8428
destination:
  addr: http://dst:8428
  extra_labels: ["job=migrated"]
filter:
  match: '{job="node"}'
  time_start: "2024-01-01T00:00:00+02:00"
  time_end: "2024-03-15T00:00:00+02:00"
  chunk: month
migration:
  concurrency: 4
  rate_limit: 1048576
  rate_limit_scope: global
  intercluster: true
retry:
  max_attempts: 3
"#;

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml(YAML).unwrap();
        assert_eq!(config.filter.match_expr, "{job=\"node\"}");
        assert_eq!(config.migration.concurrency, 4);
        assert_eq!(config.migration.rate_limit, 1_048_576);
        assert_eq!(config.migration.rate_limit_scope, RateLimitScope::Global);
        assert!(config.migration.intercluster);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.min_delay_ms, 2_000);
        assert_eq!(config.time_ranges().unwrap().len(), 3);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.source.addr, "http://src:8428");
        assert_eq!(config.destination.extra_labels, vec!["job=migrated"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::load("/nonexistent/native-migrate.yaml").unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml(
            "source: {addr: 'http://a'}\ndestination: {addr: 'http://b'}\nfilter: {time_start: '2024-01-01T00:00:00Z'}\n",
        )
        .unwrap();
        assert_eq!(config.migration.concurrency, 1);
        assert_eq!(config.migration.rate_limit, 0);
        assert_eq!(config.migration.rate_limit_scope, RateLimitScope::PerShard);
        assert_eq!(config.filter.match_expr, "{__name__!=\"\"}");
        assert!(config.destination.extra_labels.is_empty());
    }

    #[test]
    fn test_end_defaults_to_now_in_start_offset() {
        let config = Config::from_yaml(
            "source: {addr: 'http://a'}\ndestination: {addr: 'http://b'}\nfilter: {time_start: '2024-01-01T00:00:00-05:00'}\n",
        )
        .unwrap();
        let window = config.time_window().unwrap();
        assert_eq!(window.end.offset(), window.start.offset());
        assert!(window.end > window.start);
        assert_eq!(config.time_ranges().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_filter_section_is_rejected() {
        let err = Config::from_yaml("source: {addr: 'http://a'}\ndestination: {addr: 'http://b'}\n")
            .unwrap_err();
        assert!(err.to_string().contains("time_start"));
    }

    #[test]
    fn test_unvalidated_load_accepts_later_overrides() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "source: {{addr: 'http://a'}}\ndestination: {{addr: 'http://b'}}\n").unwrap();

        assert!(Config::load(file.path()).is_err());

        let mut config = Config::load_unvalidated(file.path()).unwrap();
        assert!(config.validate().is_err());
        config.filter.time_start = "2024-01-01T00:00:00Z".into();
        config.filter.time_end = Some("2024-01-02T00:00:00Z".into());
        config.validate().unwrap();
    }

    #[test]
    fn test_time_ranges_in_keeps_window_end() {
        let config = Config::from_yaml(
            "source: {addr: 'http://a'}\ndestination: {addr: 'http://b'}\nfilter: {time_start: '2024-01-01T00:00:00Z', chunk: day}\n",
        )
        .unwrap();
        let window = config.time_window().unwrap();
        let ranges = config.time_ranges_in(&window).unwrap();
        assert_eq!(ranges.first().unwrap().start, window.start);
        assert_eq!(ranges.last().unwrap().end, window.end);
    }
}
