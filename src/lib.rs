//! shardnet: cluster node management and sharded model deployment
//!
//! Nodes are managed through a [`gateway::ClusterGateway`]. Models are split
//! into shards, one per available worker node, tracked in memory and served
//! by round-robin routing over the ready shards.

pub mod cli;
pub mod cluster;
pub mod context;
pub mod gateway;
pub mod metrics;
pub mod server;
pub mod sharding;
