//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, bad time format, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Chunk specification could not be parsed
    #[error("Invalid chunk spec {0:?}: valid values are 'minute', 'hour', 'day', 'week', 'month', 'year'")]
    InvalidChunkSpec(String),

    /// Time window is empty or reversed
    #[error("Invalid time range: start {start} must be before end {end}")]
    InvalidTimeRange { start: String, end: String },

    /// Tenant or metric discovery against the source failed
    #[error("Discovery failed on {addr}: {source}")]
    Discovery {
        addr: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// Source returned zero metrics for the filter
    #[error("No metrics found on {addr} for filter {filter}")]
    NoMetricsFound { addr: String, filter: String },

    /// A shard transfer failed after exhausting its retries
    #[error("Failed to migrate from {src} to {dst} (attempts: {attempts}) with filter {filter}: {source}")]
    Transfer {
        src: String,
        dst: String,
        filter: String,
        attempts: u32,
        #[source]
        source: Box<MigrateError>,
    },

    /// Migration of one tenant failed
    #[error("Migration failed for tenant {tenant:?}: {source}")]
    Tenant {
        tenant: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint rejected the request (4xx), never retried
    #[error("Bad request to {url}: {status}: {body}")]
    BadRequest {
        url: String,
        status: u16,
        body: String,
    },

    /// Endpoint failed to serve the request (5xx or malformed response)
    #[error("Endpoint error from {url}: {message}")]
    Endpoint { url: String, message: String },

    /// In-process pipe between export and import broke
    #[error("Pipe error: {0}")]
    Pipe(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Discovery error wrapping the underlying failure
    pub fn discovery(addr: impl Into<String>, source: MigrateError) -> Self {
        MigrateError::Discovery {
            addr: addr.into(),
            source: Box::new(source),
        }
    }

    /// Create an Endpoint error
    pub fn endpoint(url: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Endpoint {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Whether a shard attempt failing with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            MigrateError::Cancelled
            | MigrateError::BadRequest { .. }
            | MigrateError::Config(_)
            | MigrateError::InvalidChunkSpec(_)
            | MigrateError::InvalidTimeRange { .. }
            | MigrateError::NoMetricsFound { .. } => false,
            MigrateError::Transfer { source, .. } | MigrateError::Tenant { source, .. } => {
                source.is_retryable()
            }
            _ => true,
        }
    }

    /// Whether this error is (or wraps) a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            MigrateError::Cancelled => true,
            MigrateError::Transfer { source, .. } | MigrateError::Tenant { source, .. } => {
                source.is_cancelled()
            }
            _ => false,
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_)
            | MigrateError::InvalidChunkSpec(_)
            | MigrateError::InvalidTimeRange { .. }
            | MigrateError::Yaml(_)
            | MigrateError::Json(_) => 1,
            MigrateError::Discovery { .. } | MigrateError::NoMetricsFound { .. } => 2,
            MigrateError::Cancelled => 4,
            MigrateError::Io(_) => 7,
            MigrateError::Tenant { source, .. } => source.exit_code(),
            MigrateError::Transfer { source, .. } if source.is_cancelled() => 4,
            _ => 3,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
