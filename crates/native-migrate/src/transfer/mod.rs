//! Streamed export → import copy for a single shard.
//!
//! Each attempt opens a fresh export stream, spawns the import request on the
//! read end of an in-process [`pipe`], and copies chunks across, optionally
//! through a [`RateLimitedSink`]. A retried attempt restarts the shard from
//! the beginning.

pub mod pipe;

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::RateLimitScope;
use crate::core::{ByteStream, DestinationEndpoint, Shard, SourceEndpoint};
use crate::error::{MigrateError, Result};
use crate::limiter::{RateLimitedSink, RateLimiter};
use crate::retry::RetryPolicy;
use crate::stats::StatsAggregator;

use self::pipe::ByteSink;

/// How writes of a transfer are throttled.
#[derive(Debug, Clone)]
enum RateLimit {
    Unlimited,
    /// A new limiter per attempt.
    PerShard(u64),
    /// One limiter shared by every transfer.
    Shared(Arc<RateLimiter>),
}

/// Performs shard transfers between one source and one destination.
///
/// Cheap to share behind an `Arc`; every worker of a run uses the same
/// instance.
pub struct ShardTransfer {
    source: Arc<dyn SourceEndpoint>,
    destination: Arc<dyn DestinationEndpoint>,
    retry: RetryPolicy,
    stats: Arc<StatsAggregator>,
    rate_limit: RateLimit,
}

impl ShardTransfer {
    /// Create an unthrottled transfer.
    pub fn new(
        source: Arc<dyn SourceEndpoint>,
        destination: Arc<dyn DestinationEndpoint>,
        retry: RetryPolicy,
        stats: Arc<StatsAggregator>,
    ) -> Self {
        Self {
            source,
            destination,
            retry,
            stats,
            rate_limit: RateLimit::Unlimited,
        }
    }

    /// Cap write throughput at `bytes_per_sec` (0 disables the cap).
    pub fn with_rate_limit(mut self, bytes_per_sec: u64, scope: RateLimitScope) -> Self {
        self.rate_limit = match (bytes_per_sec, scope) {
            (0, _) => RateLimit::Unlimited,
            (rate, RateLimitScope::PerShard) => RateLimit::PerShard(rate),
            (rate, RateLimitScope::Global) => match RateLimiter::new(rate) {
                Some(limiter) => RateLimit::Shared(limiter),
                None => RateLimit::Unlimited,
            },
        };
        self
    }

    /// Shared run statistics.
    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    /// Transfer `shard` with retries, returning the bytes copied by the
    /// successful attempt.
    pub async fn execute(&self, shard: &Shard, cancel: &CancellationToken) -> Result<u64> {
        let (attempts, result) = self
            .retry
            .run(cancel, |attempt| self.run_single(shard, attempt, cancel))
            .await;

        self.stats
            .record_retry_attempts(u64::from(attempts.saturating_sub(1)));

        match result {
            Ok(bytes) => {
                self.stats.record_transfer(bytes);
                debug!(
                    tenant = %shard.tenant,
                    metric = %shard.metric,
                    bytes,
                    attempts,
                    "shard transferred"
                );
                Ok(bytes)
            }
            Err(MigrateError::Cancelled) => Err(MigrateError::Cancelled),
            Err(err) => Err(MigrateError::Transfer {
                src: shard.src_url.clone(),
                dst: shard.dst_url.clone(),
                filter: shard.filter.to_string(),
                attempts,
                source: Box::new(err),
            }),
        }
    }

    /// One attempt: export → pipe → import.
    async fn run_single(
        &self,
        shard: &Shard,
        attempt: u32,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        debug!(metric = %shard.metric, attempt, filter = %shard.filter, "starting shard attempt");

        let mut export = tokio::select! {
            _ = cancel.cancelled() => return Err(MigrateError::Cancelled),
            res = self.source.open_export_stream(&shard.src_url, &shard.filter) => res?,
        };

        let (mut writer, reader) = pipe::pipe();

        let destination = self.destination.clone();
        let dst_url = shard.dst_url.clone();
        let import_cancel = cancel.clone();
        let mut import = tokio::spawn(async move {
            tokio::select! {
                _ = import_cancel.cancelled() => Err(MigrateError::Cancelled),
                res = destination.import_stream(&dst_url, reader) => res,
            }
        });

        let copied = match self.limiter() {
            Some(limiter) => {
                let mut sink = RateLimitedSink::new(writer, limiter);
                let res = copy(&mut export, &mut sink, cancel).await;
                writer = sink.into_inner();
                res
            }
            None => copy(&mut export, &mut writer, cancel).await,
        };

        match copied {
            Ok(written) => {
                // EOF for the import request.
                writer.close();
                join_import(&mut import).await?;
                Ok(written)
            }
            Err(CopyError::Sink(err)) => {
                // The import side went away first; its error is the cause.
                drop(writer);
                join_import(&mut import).await?;
                Err(err)
            }
            Err(CopyError::Source(err)) => {
                // Stop the import while the writer is still open so the
                // destination never sees a clean EOF for a partial payload.
                import.abort();
                if let Err(import_err) = join_import(&mut import).await {
                    if !matches!(import_err, MigrateError::Cancelled) {
                        warn!(error = %import_err, "import failed while aborting shard attempt");
                    }
                }
                drop(writer);
                Err(err)
            }
        }
    }

    fn limiter(&self) -> Option<Arc<RateLimiter>> {
        match &self.rate_limit {
            RateLimit::Unlimited => None,
            RateLimit::PerShard(rate) => RateLimiter::new(*rate),
            RateLimit::Shared(limiter) => Some(limiter.clone()),
        }
    }
}

/// Which side of a copy failed.
#[derive(Debug)]
enum CopyError {
    /// The export stream failed or the attempt was cancelled mid-read.
    Source(MigrateError),
    /// Writing into the pipe failed.
    Sink(MigrateError),
}

/// Copy every chunk of `export` into `sink`, returning the byte count.
///
/// Cancellation counts as a source failure so the import is aborted.
async fn copy<S: ByteSink>(
    export: &mut ByteStream,
    sink: &mut S,
    cancel: &CancellationToken,
) -> std::result::Result<u64, CopyError> {
    let mut written = 0u64;
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(CopyError::Source(MigrateError::Cancelled)),
            next = export.next() => next,
        };
        let chunk = match next {
            Some(chunk) => chunk.map_err(CopyError::Source)?,
            None => return Ok(written),
        };

        let len = chunk.len() as u64;
        tokio::select! {
            _ = cancel.cancelled() => return Err(CopyError::Source(MigrateError::Cancelled)),
            res = sink.write(chunk) => res.map_err(CopyError::Sink)?,
        }
        written += len;
    }
}

async fn join_import(import: &mut tokio::task::JoinHandle<Result<()>>) -> Result<()> {
    match import.await {
        Ok(res) => res,
        Err(e) if e.is_cancelled() => Err(MigrateError::Cancelled),
        Err(e) => Err(MigrateError::Pipe(format!("import task failed: {}", e))),
    }
}
