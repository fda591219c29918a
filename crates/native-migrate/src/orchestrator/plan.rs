//! Per-tenant shard plan: metrics × time ranges.

use crate::core::{build_match_with_metric, Filter, Shard, TimeRange};
use crate::error::Result;

/// Everything needed to build the shards of one tenant.
#[derive(Debug, Clone)]
pub struct ShardPlan {
    pub tenant: String,
    pub base_match: String,
    pub metrics: Vec<String>,
    pub ranges: Vec<TimeRange>,
    pub src_url: String,
    pub dst_url: String,
}

impl ShardPlan {
    /// Number of shards the plan produces.
    pub fn len(&self) -> usize {
        self.metrics.len() * self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shards in ascending (metric, then range) order.
    ///
    /// The per-metric selector is built once per metric; a selector that
    /// cannot be rewritten yields an error in place of that metric's shards.
    pub fn shards(&self) -> impl Iterator<Item = Result<Shard>> + '_ {
        self.metrics.iter().flat_map(move |metric| {
            let matcher = build_match_with_metric(&self.base_match, metric);
            let ranges: Box<dyn Iterator<Item = Result<Shard>> + '_> = match matcher {
                Ok(matcher) => Box::new(self.ranges.iter().map(move |range| {
                    Ok(Shard {
                        metric: metric.clone(),
                        tenant: self.tenant.clone(),
                        filter: Filter::with_range(matcher.clone(), *range),
                        src_url: self.src_url.clone(),
                        dst_url: self.dst_url.clone(),
                    })
                })),
                Err(err) => Box::new(std::iter::once(Err(err))),
            };
            ranges
        })
    }
}
