//! Endpoint traits for the migration engine.
//!
//! - [`SourceEndpoint`]: discovers tenants and metrics, opens export streams
//! - [`DestinationEndpoint`]: consumes import streams
//!
//! Both are shared read-only by every worker and must be safe for concurrent
//! use. The payload is an opaque stream of native-format bytes; the engine
//! never inspects it.
//!
//! Retried shards restart their export from the beginning, so a destination
//! may receive the same shard's data more than once. Implementations must
//! treat repeated imports as idempotent overwrites.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

use super::filter::Filter;

/// Opaque stream of native-format payload chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Read side of a migration.
#[async_trait]
pub trait SourceEndpoint: Send + Sync {
    /// Base address, used for URL construction and error context.
    fn addr(&self) -> &str;

    /// List tenants that hold data matching the filter's time range.
    async fn discover_tenants(&self, filter: &Filter) -> Result<Vec<String>>;

    /// List metric names matching the filter. `tenant` is empty in
    /// single-tenant mode.
    async fn list_metric_names(&self, filter: &Filter, tenant: &str) -> Result<Vec<String>>;

    /// Start a native export from `url` for `filter`.
    ///
    /// The returned stream yields payload chunks in source order until EOF.
    async fn open_export_stream(&self, url: &str, filter: &Filter) -> Result<ByteStream>;

    /// Probe that the endpoint is reachable.
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

/// Write side of a migration.
#[async_trait]
pub trait DestinationEndpoint: Send + Sync {
    /// Base address, used for URL construction and error context.
    fn addr(&self) -> &str;

    /// Feed `body` into a native import at `url`, returning once the
    /// destination has accepted the whole stream.
    ///
    /// An `Err` item in `body` means the producer aborted; the import must
    /// fail rather than commit a partial payload.
    async fn import_stream(&self, url: &str, body: ByteStream) -> Result<()>;

    /// Probe that the endpoint is reachable.
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}
