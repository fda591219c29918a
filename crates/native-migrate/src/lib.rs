//! # native-migrate
//!
//! Concurrent migration of time-series data between native export/import
//! endpoints.
//!
//! A run splits the configured time window into chunks, discovers the metric
//! names (and, in intercluster mode, the tenants) to copy, and streams every
//! `(metric, time range)` shard from the source's export endpoint into the
//! destination's import endpoint:
//!
//! - **Bounded worker pool** with fail-fast abort and clean shutdown
//! - **Streaming copy** through an in-process pipe, no full-payload buffering
//! - **Per-shard retries** with exponential backoff and jitter
//! - **Rate limiting** per shard or across the whole pool
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use native_migrate::{Config, NativeClient, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> native_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let source = Arc::new(NativeClient::new(&config.source.addr)?);
//!     let destination = Arc::new(NativeClient::new(&config.destination.addr)?);
//!     let result = Orchestrator::new(config, source, destination)
//!         .silent(true)
//!         .run(&CancellationToken::new())
//!         .await?;
//!     println!("Migrated {} bytes", result.stats.bytes);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod limiter;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod stats;
pub mod transfer;

// Re-exports for convenient access
pub use client::NativeClient;
pub use config::{Config, MigrationConfig, RateLimitScope, RetryConfig};
pub use crate::core::{ByteStream, DestinationEndpoint, Filter, Shard, SourceEndpoint, TimeRange};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    AutoConfirm, EndpointHealth, HealthReport, MigrationDispatcher, MigrationResult, Orchestrator,
    Prompt, RunStatus, ShardPlan, TenantResult,
};
pub use planner::ChunkSpec;
pub use stats::{StatsAggregator, StatsReport};
pub use transfer::ShardTransfer;
