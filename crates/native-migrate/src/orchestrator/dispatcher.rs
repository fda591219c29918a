//! Bounded worker pool that fans shards out to [`ShardTransfer`].
//!
//! One producer feeds `concurrency` persistent workers through a capacity-1
//! queue. The first worker error, or external cancellation, stops
//! production. Whatever the exit reason, the queue is closed and every
//! worker is joined before [`MigrationDispatcher::run`] returns.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::core::Shard;
use crate::error::{MigrateError, Result};
use crate::transfer::ShardTransfer;

use super::plan::ShardPlan;

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Shards handed to workers.
    pub dispatched: usize,
}

/// Executes a [`ShardPlan`] under bounded concurrency.
pub struct MigrationDispatcher {
    transfer: Arc<ShardTransfer>,
    concurrency: usize,
}

impl MigrationDispatcher {
    pub fn new(transfer: Arc<ShardTransfer>, concurrency: usize) -> Self {
        Self {
            transfer,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every shard of `plan`, failing fast on the first shard error.
    ///
    /// Shards already handed to a worker when a failure is observed run to
    /// completion; no shard is started afterwards.
    pub async fn run(&self, plan: &ShardPlan, cancel: &CancellationToken) -> Result<DispatchSummary> {
        let (work_tx, work_rx) = async_channel::bounded::<Shard>(1);
        let (err_tx, mut err_rx) = mpsc::channel::<MigrateError>(self.concurrency);

        // Set by the first failing worker. Not passed to transfers, so
        // in-flight shards are left to finish.
        let abort = CancellationToken::new();

        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            let work_rx = work_rx.clone();
            let err_tx = err_tx.clone();
            let transfer = self.transfer.clone();
            let cancel = cancel.clone();
            let abort = abort.clone();

            workers.spawn(async move {
                while let Ok(shard) = work_rx.recv().await {
                    if abort.is_cancelled() || cancel.is_cancelled() {
                        break;
                    }
                    if let Err(e) = transfer.execute(&shard, &cancel).await {
                        if !e.is_cancelled() {
                            error!(worker_id, metric = %shard.metric, "shard failed: {}", e);
                        }
                        abort.cancel();
                        // Each worker sends at most once into a queue sized
                        // for all of them.
                        let _ = err_tx.send(e).await;
                        return;
                    }
                }
                debug!(worker_id, "worker finished");
            });
        }
        drop(work_rx);
        drop(err_tx);

        let mut first_err: Option<MigrateError> = None;
        let mut dispatched = 0usize;

        for shard in plan.shards() {
            let shard = match shard {
                Ok(shard) => shard,
                Err(e) => {
                    first_err = Some(e);
                    break;
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(tenant = %plan.tenant, "cancellation requested, stopping new transfers");
                    first_err = Some(MigrateError::Cancelled);
                    break;
                }
                Some(e) = err_rx.recv() => {
                    first_err = Some(e);
                    break;
                }
                sent = work_tx.send(shard) => {
                    if sent.is_err() {
                        // Every worker has exited; their errors are drained below.
                        break;
                    }
                    dispatched += 1;
                }
            }
        }

        work_tx.close();
        drop(work_tx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                if first_err.is_none() {
                    first_err = Some(MigrateError::Pipe(format!("worker task failed: {}", e)));
                }
            }
        }

        while let Ok(e) = err_rx.try_recv() {
            if first_err.is_none() {
                first_err = Some(e);
            }
        }

        if first_err.is_none() && cancel.is_cancelled() {
            first_err = Some(MigrateError::Cancelled);
        }

        match first_err {
            None => Ok(DispatchSummary { dispatched }),
            Some(MigrateError::Cancelled) => Err(MigrateError::Cancelled),
            Some(e) => Err(MigrateError::Tenant {
                tenant: plan.tenant.clone(),
                source: Box::new(e),
            }),
        }
    }
}
