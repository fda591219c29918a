//! Migration orchestrator - main workflow coordinator.

mod dispatcher;
mod plan;
mod prompt;

pub use dispatcher::{DispatchSummary, MigrationDispatcher};
pub use plan::ShardPlan;
pub use prompt::{AutoConfirm, Prompt};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::core::paths::{export_url, import_url};
use crate::core::{DestinationEndpoint, Filter, SourceEndpoint, TimeRange};
use crate::error::{MigrateError, Result};
use crate::retry::RetryPolicy;
use crate::stats::{StatsAggregator, StatsReport};
use crate::transfer::ShardTransfer;

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceEndpoint>,
    destination: Arc<dyn DestinationEndpoint>,
    prompt: Arc<dyn Prompt>,
    silent: bool,
    dry_run: bool,
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Planning only, nothing transferred.
    DryRun,
    /// The operator declined the tenant list.
    Declined,
}

/// Per-tenant outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantResult {
    /// Empty in single-tenant mode.
    pub tenant: String,
    pub metrics: usize,
    pub shards_planned: usize,
    pub shards_dispatched: usize,
    /// False when the operator declined this tenant.
    pub migrated: bool,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Time ranges each metric was split into.
    pub ranges: usize,

    /// Tenants processed, in discovery order.
    pub tenants: Vec<TenantResult>,

    /// Shards across all tenants.
    pub shards_planned: usize,

    /// Byte and request counters.
    pub stats: StatsReport,
}

impl MigrationResult {
    /// Convert result to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Health of one endpoint.
#[derive(Debug)]
pub struct EndpointHealth {
    pub addr: String,
    pub result: Result<()>,
}

impl EndpointHealth {
    pub fn is_healthy(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of [`Orchestrator::health_check`].
#[derive(Debug)]
pub struct HealthReport {
    pub source: EndpointHealth,
    pub destination: EndpointHealth,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.source.is_healthy() && self.destination.is_healthy()
    }

    /// Convert report to JSON.
    pub fn to_json(&self) -> Result<String> {
        let entry = |endpoint: &EndpointHealth| {
            serde_json::json!({
                "addr": endpoint.addr,
                "healthy": endpoint.is_healthy(),
                "error": endpoint.result.as_ref().err().map(|e| e.to_string()),
            })
        };
        let report = serde_json::json!({
            "source": entry(&self.source),
            "destination": entry(&self.destination),
        });
        Ok(serde_json::to_string_pretty(&report)?)
    }

    /// The first failure, source before destination.
    pub fn into_result(self) -> Result<()> {
        self.source.result?;
        self.destination.result
    }
}

impl Orchestrator {
    /// Create a new orchestrator over already-constructed endpoints.
    pub fn new(
        config: Config,
        source: Arc<dyn SourceEndpoint>,
        destination: Arc<dyn DestinationEndpoint>,
    ) -> Self {
        Self {
            config,
            source,
            destination,
            prompt: Arc::new(AutoConfirm),
            silent: false,
            dry_run: false,
        }
    }

    /// Use `prompt` for interactive confirmations.
    pub fn with_prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Skip every confirmation.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Discover and plan without transferring anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check both endpoints, even if the first one fails.
    pub async fn health_check(&self) -> HealthReport {
        let source = EndpointHealth {
            addr: self.source.addr().to_string(),
            result: self.source.health().await,
        };
        let destination = EndpointHealth {
            addr: self.destination.addr().to_string(),
            result: self.destination.health().await,
        };

        for (role, endpoint) in [("Source", &source), ("Destination", &destination)] {
            match &endpoint.result {
                Ok(()) => info!("{} {} is healthy", role, endpoint.addr),
                Err(e) => warn!("{} {} is unhealthy: {}", role, endpoint.addr, e),
            }
        }

        HealthReport {
            source,
            destination,
        }
    }

    /// Run the migration.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting native migration run: {}", run_id);

        let window = self.config.time_window()?;
        let ranges = self.config.time_ranges_in(&window)?;
        let base = Filter::with_range(self.config.filter.match_expr.clone(), window);
        info!(
            "Time window {} split into {} range(s) (chunk: {})",
            window,
            ranges.len(),
            self.config.filter.chunk.as_deref().unwrap_or("none")
        );

        let stats = Arc::new(StatsAggregator::new());
        let transfer = Arc::new(
            ShardTransfer::new(
                self.source.clone(),
                self.destination.clone(),
                RetryPolicy::from_config(&self.config.retry),
                stats.clone(),
            )
            .with_rate_limit(
                self.config.migration.rate_limit,
                self.config.migration.rate_limit_scope,
            ),
        );
        let dispatcher = MigrationDispatcher::new(transfer, self.config.migration.concurrency);

        let mut status = if self.dry_run {
            RunStatus::DryRun
        } else {
            RunStatus::Completed
        };
        let mut tenant_results = Vec::new();

        let tenants = self.tenants(&base, cancel).await?;
        match tenants {
            None => status = RunStatus::Declined,
            Some(tenants) => {
                for tenant in tenants {
                    if cancel.is_cancelled() {
                        return Err(MigrateError::Cancelled);
                    }
                    let result = self
                        .migrate_tenant(&dispatcher, &base, &ranges, tenant, cancel)
                        .await?;
                    tenant_results.push(result);
                }
            }
        }

        let report = stats.snapshot();
        info!("{}", report);

        Ok(MigrationResult {
            run_id,
            status,
            started_at,
            completed_at: Utc::now(),
            ranges: ranges.len(),
            shards_planned: tenant_results.iter().map(|t| t.shards_planned).sum(),
            tenants: tenant_results,
            stats: report,
        })
    }

    /// Tenants to migrate, or `None` if the operator declined them.
    async fn tenants(
        &self,
        base: &Filter,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<String>>> {
        if !self.config.migration.intercluster {
            return Ok(Some(vec![String::new()]));
        }

        info!("Discovering tenants on {}", self.source.addr());
        let tenants = tokio::select! {
            _ = cancel.cancelled() => return Err(MigrateError::Cancelled),
            res = self.source.discover_tenants(base) => {
                res.map_err(|e| as_discovery(self.source.addr(), e))?
            }
        };

        if tenants.is_empty() {
            warn!("No tenants found on {} for {}", self.source.addr(), base);
            return Ok(Some(tenants));
        }

        info!("Discovered tenants: {:?}", tenants);
        if !self.silent {
            let question = format!(
                "The following tenants were discovered: {:?}.\nContinue?",
                tenants
            );
            if !self.prompt.confirm(&question) {
                info!("Migration declined");
                return Ok(None);
            }
        }

        Ok(Some(tenants))
    }

    async fn migrate_tenant(
        &self,
        dispatcher: &MigrationDispatcher,
        base: &Filter,
        ranges: &[TimeRange],
        tenant: String,
        cancel: &CancellationToken,
    ) -> Result<TenantResult> {
        let intercluster = self.config.migration.intercluster;
        let wrap = |e: MigrateError| match e {
            MigrateError::Cancelled => e,
            e if intercluster => MigrateError::Tenant {
                tenant: tenant.clone(),
                source: Box::new(e),
            },
            e => e,
        };

        info!(tenant = %tenant, "Exploring metrics on {}", self.source.addr());
        let metrics = tokio::select! {
            _ = cancel.cancelled() => return Err(MigrateError::Cancelled),
            res = self.source.list_metric_names(base, &tenant) => {
                res.map_err(|e| wrap(as_discovery(self.source.addr(), e)))?
            }
        };

        if metrics.is_empty() {
            return Err(wrap(MigrateError::NoMetricsFound {
                addr: self.source.addr().to_string(),
                filter: base.to_string(),
            }));
        }

        let mut result = TenantResult {
            tenant: tenant.clone(),
            metrics: metrics.len(),
            shards_planned: 0,
            shards_dispatched: 0,
            migrated: false,
        };

        if intercluster {
            info!(tenant = %tenant, "Found {} metrics to import", metrics.len());
        } else if !self.silent {
            let question = format!("Found {} metrics to import. Continue?", metrics.len());
            if !self.prompt.confirm(&question) {
                info!(tenant = %tenant, "Import declined");
                return Ok(result);
            }
        }

        let src_url = export_url(self.source.addr(), &tenant);
        let dst_url = import_url(
            self.destination.addr(),
            &tenant,
            &self.config.destination.extra_labels,
        )
        .map_err(&wrap)?;

        let plan = ShardPlan {
            tenant: tenant.clone(),
            base_match: base.match_expr.clone(),
            metrics,
            ranges: ranges.to_vec(),
            src_url,
            dst_url,
        };
        result.shards_planned = plan.len();

        info!(
            tenant = %tenant,
            "Initing import process from {} to {} with filter {}: {} shard(s), concurrency {}",
            plan.src_url,
            plan.dst_url,
            base,
            plan.len(),
            dispatcher.concurrency()
        );

        if self.dry_run {
            return Ok(result);
        }

        let summary = dispatcher.run(&plan, cancel).await?;
        result.shards_dispatched = summary.dispatched;
        result.migrated = true;
        info!(tenant = %tenant, "Import finished: {} shard(s)", summary.dispatched);
        Ok(result)
    }
}

/// Attach source context to a discovery failure.
fn as_discovery(addr: &str, err: MigrateError) -> MigrateError {
    match err {
        MigrateError::Cancelled | MigrateError::Discovery { .. } => err,
        other => MigrateError::discovery(addr, other),
    }
}
