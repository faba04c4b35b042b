//! # Cluster node management
//!
//! Node discovery, classification and lifecycle operations. Nodes are owned
//! by the cluster control plane; this module only queries and patches them
//! through a [`ClusterGateway`](crate::gateway::ClusterGateway).
//!
//! - [`NodeRegistry`]: list nodes and pick out available workers
//! - [`NodeLifecycleController`]: label, cordon, uncordon, drain, monitor

pub mod lifecycle;
pub mod node;
pub mod registry;

pub use lifecycle::{DrainReport, LifecycleError, NodeLifecycleController};
pub use node::{Node, NodeCondition, NodePatch};
pub use registry::NodeRegistry;

/// Condition type marking a node healthy
pub const READY_CONDITION: &str = "Ready";

/// Label key identifying the node's role
pub const WORKER_LABEL_KEY: &str = "node-type";

/// Label value marking a node as a worker
pub const WORKER_LABEL_VALUE: &str = "worker";

/// Grace period used when evicting pods during a drain
pub const DRAIN_GRACE_PERIOD_SECS: i64 = 0;
