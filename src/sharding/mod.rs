//! # Sharded model deployment
//!
//! A model is deployed as N independent shards, one per worker node. The
//! pieces, leaf first:
//!
//! - [`ShardPlanner`]: picks N available worker nodes or fails fast
//! - [`DeploymentOrchestrator`]: submits one deployment per shard, tracks
//!   each in a [`DeploymentStore`], reconciles against the gateway
//! - [`InferenceRouter`]: round-robins requests over ready shards
//! - [`ShardingStrategy`]: the pluggable facade over all of the above, with
//!   [`PartitionSharding`] as the one implementation

pub mod balancer;
pub mod deployment;
pub mod orchestrator;
pub mod partition;
pub mod planner;
pub mod router;
pub mod strategy;

use thiserror::Error;

use crate::gateway::GatewayError;

pub use balancer::RoundRobinBalancer;
pub use deployment::{DeploymentStore, ShardDeployment, ShardStatus};
pub use orchestrator::{DeploymentOrchestrator, DistributedDeployment, OrchestratorConfig};
pub use partition::PartitionSharding;
pub use planner::{PlacementPlan, ShardPlanner};
pub use router::{InferenceRouteDecision, InferenceRouter};
pub use strategy::{ShardingOptions, ShardingStrategy};

/// Default port exposed by every shard container
pub const DEFAULT_SERVICE_PORT: u16 = 8080;

/// Replicas per shard deployment
pub const SHARD_REPLICAS: u32 = 1;

/// Errors from placement, deployment and routing
#[derive(Error, Debug)]
pub enum ShardError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Failed to deploy '{name}': {source}")]
    Deployment { name: String, source: GatewayError },

    #[error(
        "Insufficient capacity: {requested} shard(s) requested, {available} worker node(s) available"
    )]
    InsufficientCapacity { requested: usize, available: usize },

    #[error("No ready shards for model '{0}'")]
    NoReadyShards(String),

    #[error("{operation} partially failed: {succeeded} succeeded, failed: {failed:?}")]
    PartialFailure {
        operation: &'static str,
        succeeded: usize,
        failed: Vec<String>,
    },
}

/// Shard name for partition `index` of a model
pub fn shard_name(model_name: &str, index: usize) -> String {
    format!("{}-shard{}", model_name, index)
}
