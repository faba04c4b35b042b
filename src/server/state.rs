use std::sync::Arc;

use tokio::sync::Mutex;

use crate::cluster::{NodeLifecycleController, NodeRegistry};
use crate::gateway::SharedGateway;
use crate::sharding::{OrchestratorConfig, PartitionSharding, ShardingStrategy};

/// The one strategy the server owns; every request takes the lock
pub type SharedStrategy = Arc<Mutex<Box<dyn ShardingStrategy>>>;

/// Shared application state
#[derive(Clone)]
pub struct ShardApiState {
    pub strategy: SharedStrategy,
    pub registry: NodeRegistry,
    pub lifecycle: NodeLifecycleController,
}

impl ShardApiState {
    /// State backed by partition sharding against `gateway`
    pub fn new(gateway: SharedGateway, config: OrchestratorConfig) -> Self {
        let strategy = PartitionSharding::new(gateway.clone(), config);
        Self::with_strategy(gateway, Box::new(strategy))
    }

    pub fn with_strategy(gateway: SharedGateway, strategy: Box<dyn ShardingStrategy>) -> Self {
        Self {
            strategy: Arc::new(Mutex::new(strategy)),
            registry: NodeRegistry::new(gateway.clone()),
            lifecycle: NodeLifecycleController::new(gateway),
        }
    }

    /// Name of the active strategy
    pub async fn strategy_name(&self) -> &'static str {
        self.strategy.lock().await.name()
    }
}
