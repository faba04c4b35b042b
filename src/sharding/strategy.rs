//! Pluggable sharding strategies
//!
//! A strategy decides how a model is split and how requests find a shard.
//! New strategies are new implementations of [`ShardingStrategy`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::deployment::ShardDeployment;
use super::orchestrator::DistributedDeployment;
use super::router::InferenceRouteDecision;
use super::ShardError;
use crate::metrics::PerformanceReport;

/// Shards used when a deploy request does not say
pub const DEFAULT_NUM_SHARDS: usize = 3;

fn default_num_shards() -> usize {
    DEFAULT_NUM_SHARDS
}

/// Per-deploy knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingOptions {
    #[serde(rename = "numShards", default = "default_num_shards")]
    pub num_shards: usize,
}

impl Default for ShardingOptions {
    fn default() -> Self {
        Self {
            num_shards: DEFAULT_NUM_SHARDS,
        }
    }
}

impl ShardingOptions {
    pub fn with_shards(num_shards: usize) -> Self {
        Self { num_shards }
    }
}

/// Deploy, route, observe and tear down a sharded model
#[async_trait]
pub trait ShardingStrategy: Send + Sync {
    /// Short identifier, e.g. `partition`
    fn name(&self) -> &'static str;

    /// Deploy `model` at `version` from `image`
    async fn deploy(
        &mut self,
        model: &str,
        version: &str,
        image: &str,
        options: ShardingOptions,
    ) -> Result<DistributedDeployment, ShardError>;

    /// Pick a shard for one request
    async fn route(&self, model: &str, request: &Value)
        -> Result<InferenceRouteDecision, ShardError>;

    /// Refresh and return tracked shards of `model`, or all when `None`
    async fn status(&mut self, model: Option<&str>) -> Vec<ShardDeployment>;

    /// Synthetic performance report for `model`
    async fn monitor_performance(&self, model: &str, window_secs: u64) -> PerformanceReport;

    /// Remove every deployment of `model`, returning how many were deleted
    async fn cleanup(&mut self, model: &str) -> Result<usize, ShardError>;
}
