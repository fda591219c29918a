//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source endpoint the data is exported from.
    pub source: SourceConfig,

    /// Destination endpoint the data is imported into.
    pub destination: DestinationConfig,

    /// Base series filter and migration time window.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Worker pool and throughput settings.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Per-shard retry behavior.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Source endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL, e.g. `http://vmselect:8481`.
    pub addr: String,
}

/// Destination endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// Base URL, e.g. `http://vminsert:8480`.
    pub addr: String,

    /// Static `key=value` labels attached to every imported series.
    #[serde(default)]
    pub extra_labels: Vec<String>,
}

/// Base filter applied to every exported shard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Series selector merged with each metric name.
    #[serde(rename = "match", default = "default_match")]
    pub match_expr: String,

    /// Start of the migration window (RFC3339, required).
    #[serde(default)]
    pub time_start: String,

    /// End of the migration window (RFC3339). Defaults to now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,

    /// Unit used to split the window into shards (minute, hour, day, week,
    /// month, year). Unset means one range for the whole window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            match_expr: default_match(),
            time_start: String::new(),
            time_end: None,
            chunk: None,
        }
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Number of shard transfers running at once (default: 1).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Byte-rate cap in bytes/second; 0 disables limiting.
    #[serde(default)]
    pub rate_limit: u64,

    /// Whether the cap applies per shard transfer or to the whole run.
    #[serde(default)]
    pub rate_limit_scope: RateLimitScope,

    /// Migrate tenant by tenant between multi-tenant clusters.
    #[serde(default)]
    pub intercluster: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            rate_limit: 0,
            rate_limit_scope: RateLimitScope::default(),
            intercluster: false,
        }
    }
}

/// Scope of the byte-rate cap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitScope {
    /// A fresh limiter per shard transfer. Aggregate throughput may reach
    /// `concurrency` times the cap.
    #[default]
    PerShard,
    /// One limiter shared by every worker.
    Global,
}

/// Per-shard retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per shard including the first one (default: 10).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failure in milliseconds (default: 2000).
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Growth factor between consecutive delays (default: 1.8).
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Upper bound for a single delay in milliseconds (default: 60000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Random spread applied to each delay, as a fraction (default: 0.1).
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_delay_ms: default_min_delay_ms(),
            factor: default_factor(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

fn default_match() -> String {
    "{__name__!=\"\"}".to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    10
}

fn default_min_delay_ms() -> u64 {
    2_000
}

fn default_factor() -> f64 {
    1.8
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter() -> f64 {
    0.1
}
