//! Partition sharding: a model split into equal parts, one per worker node

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use super::deployment::{DeploymentStore, ShardDeployment};
use super::orchestrator::{DeploymentOrchestrator, DistributedDeployment, OrchestratorConfig};
use super::router::{InferenceRouteDecision, InferenceRouter};
use super::strategy::{ShardingOptions, ShardingStrategy};
use super::ShardError;
use crate::gateway::SharedGateway;
use crate::metrics::PerformanceReport;

/// Equal partitions, round-robin routing
pub struct PartitionSharding {
    orchestrator: DeploymentOrchestrator,
    router: InferenceRouter,
}

impl PartitionSharding {
    pub fn new(gateway: SharedGateway, config: OrchestratorConfig) -> Self {
        Self {
            orchestrator: DeploymentOrchestrator::new(gateway, DeploymentStore::new(), config),
            router: InferenceRouter::new(),
        }
    }

    pub fn orchestrator(&self) -> &DeploymentOrchestrator {
        &self.orchestrator
    }
}

#[async_trait]
impl ShardingStrategy for PartitionSharding {
    fn name(&self) -> &'static str {
        "partition"
    }

    async fn deploy(
        &mut self,
        model: &str,
        version: &str,
        image: &str,
        options: ShardingOptions,
    ) -> Result<DistributedDeployment, ShardError> {
        info!(
            "Deploying {}:{} as {} partition(s)",
            model, version, options.num_shards
        );
        self.orchestrator
            .try_deploy_distributed_model(model, version, image, options.num_shards)
            .await
    }

    async fn route(
        &self,
        model: &str,
        request: &Value,
    ) -> Result<InferenceRouteDecision, ShardError> {
        self.router
            .route_inference_request(self.orchestrator.store(), model, request)
    }

    async fn status(&mut self, model: Option<&str>) -> Vec<ShardDeployment> {
        self.orchestrator.get_deployment_status(model).await
    }

    async fn monitor_performance(&self, model: &str, window_secs: u64) -> PerformanceReport {
        self.router
            .monitor_inference_performance(self.orchestrator.store(), model, window_secs)
    }

    async fn cleanup(&mut self, model: &str) -> Result<usize, ShardError> {
        let deleted = self.orchestrator.cleanup_model_deployment(model).await?;
        self.router.forget(model);
        Ok(deleted)
    }
}
