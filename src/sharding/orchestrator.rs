//! Deployment orchestrator - issues shard deployments and tracks them
//!
//! The orchestrator owns its [`DeploymentStore`] and is the only thing that
//! writes to it. Every mutating method takes `&mut self`; callers sharing an
//! orchestrator between tasks must put it behind a lock.
//!
//! Failure handling differs per operation:
//! - a distributed deploy keeps going when one shard fails
//! - a status refresh marks an unreadable shard `unknown` and keeps going
//! - a cleanup stops at the first failed delete, leaving earlier deletes done

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::deployment::{DeploymentStore, ShardDeployment, ShardStatus};
use super::planner::ShardPlanner;
use super::{shard_name, ShardError, DEFAULT_SERVICE_PORT, SHARD_REPLICAS};
use crate::cluster::NodeRegistry;
use crate::gateway::{DeploymentSpec, SharedGateway, MODEL_LABEL};

/// Settings applied to every deployment the orchestrator submits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Namespace deployments are created in
    pub namespace: String,

    /// Port exposed by each shard container
    pub service_port: u16,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            service_port: DEFAULT_SERVICE_PORT,
        }
    }
}

/// Outcome of a distributed deploy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedDeployment {
    /// Shard name -> node, for shards that were submitted successfully
    pub shards: BTreeMap<String, String>,

    /// Shard names whose deployment failed
    pub failed: Vec<String>,
}

impl DistributedDeployment {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// What to deploy and where
struct ShardTarget<'a> {
    base_model: &'a str,
    model_name: &'a str,
    version: &'a str,
    node: &'a str,
    image: &'a str,
}

/// Submits shard deployments and reconciles their status
pub struct DeploymentOrchestrator {
    gateway: SharedGateway,
    planner: ShardPlanner,
    store: DeploymentStore,
    config: OrchestratorConfig,
}

impl DeploymentOrchestrator {
    pub fn new(gateway: SharedGateway, store: DeploymentStore, config: OrchestratorConfig) -> Self {
        let planner = ShardPlanner::new(NodeRegistry::new(gateway.clone()));
        Self {
            gateway,
            planner,
            store,
            config,
        }
    }

    /// Tracked deployments
    pub fn store(&self) -> &DeploymentStore {
        &self.store
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Build the deployment unit for one shard
    fn build_spec(&self, target: &ShardTarget<'_>) -> DeploymentSpec {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), target.model_name.to_string());
        labels.insert("version".to_string(), target.version.to_string());
        labels.insert(MODEL_LABEL.to_string(), target.base_model.to_string());

        DeploymentSpec {
            name: ShardDeployment::deployment_id(target.model_name, target.version),
            namespace: self.config.namespace.clone(),
            container_name: target.model_name.to_string(),
            image: target.image.to_string(),
            port: self.config.service_port,
            node_name: target.node.to_string(),
            replicas: SHARD_REPLICAS,
            labels,
        }
    }

    async fn deploy_shard(
        &mut self,
        target: ShardTarget<'_>,
    ) -> Result<ShardDeployment, ShardError> {
        let spec = self.build_spec(&target);

        if let Err(source) = self.gateway.create_deployment(&spec).await {
            error!(
                "Failed to deploy {} to node {}: {}",
                spec.name, target.node, source
            );
            return Err(ShardError::Deployment {
                name: spec.name,
                source,
            });
        }

        let record = ShardDeployment {
            id: spec.name.clone(),
            model_name: target.model_name.to_string(),
            base_model: target.base_model.to_string(),
            version: target.version.to_string(),
            node: target.node.to_string(),
            namespace: spec.namespace.clone(),
            replicas: spec.replicas,
            status: ShardStatus::Deploying,
            ready_replicas: 0,
            available_replicas: 0,
            created_at: Utc::now(),
        };
        self.store.insert(record.clone());

        info!("Deployed {} to node {}", record.id, record.node);
        Ok(record)
    }

    /// Deploy one model unit pinned to `node`, returning the tracked record
    pub async fn try_deploy_model(
        &mut self,
        model_name: &str,
        version: &str,
        node: &str,
        image: &str,
    ) -> Result<ShardDeployment, ShardError> {
        self.deploy_shard(ShardTarget {
            base_model: model_name,
            model_name,
            version,
            node,
            image,
        })
        .await
    }

    /// Deploy one model unit pinned to `node`
    ///
    /// Failures are logged and reported as `false`; no record is created.
    pub async fn deploy_model(
        &mut self,
        model_name: &str,
        version: &str,
        node: &str,
        image: &str,
    ) -> bool {
        self.try_deploy_model(model_name, version, node, image)
            .await
            .is_ok()
    }

    /// Deploy `num_shards` shards of a model, one per available worker
    ///
    /// Fails only when placement fails. Individual shard failures are
    /// collected in [`DistributedDeployment::failed`] and never retried.
    pub async fn try_deploy_distributed_model(
        &mut self,
        model_name: &str,
        version: &str,
        image: &str,
        num_shards: usize,
    ) -> Result<DistributedDeployment, ShardError> {
        let plan = self.planner.plan_shards(num_shards).await?;
        let mut outcome = DistributedDeployment::default();

        for (index, node) in plan.iter() {
            let shard = shard_name(model_name, index);
            let target = ShardTarget {
                base_model: model_name,
                model_name: &shard,
                version,
                node,
                image,
            };

            let result = self.deploy_shard(target).await;
            match result {
                Ok(_) => {
                    outcome.shards.insert(shard, node.to_string());
                }
                Err(_) => outcome.failed.push(shard),
            }
        }

        if outcome.is_partial() {
            warn!(
                "Model {}: {} of {} shard(s) failed to deploy: {:?}",
                model_name,
                outcome.failed.len(),
                num_shards,
                outcome.failed
            );
        } else {
            info!(
                "Model {} deployed as {} shard(s)",
                model_name,
                outcome.shards.len()
            );
        }

        Ok(outcome)
    }

    /// Deploy a model across workers, returning shard name -> node
    ///
    /// An empty map means nothing was deployed, e.g. because there were not
    /// enough worker nodes. Failed shards are left out of the map.
    pub async fn deploy_distributed_model(
        &mut self,
        model_name: &str,
        version: &str,
        image: &str,
        num_shards: usize,
    ) -> BTreeMap<String, String> {
        match self
            .try_deploy_distributed_model(model_name, version, image, num_shards)
            .await
        {
            Ok(outcome) => outcome.shards,
            Err(e) => {
                error!("Distributed deploy of {} aborted: {}", model_name, e);
                BTreeMap::new()
            }
        }
    }

    /// Refresh and return tracked deployments of a model (all when `None`)
    ///
    /// A shard whose deployment cannot be read is marked `unknown`; the rest
    /// of the batch is still refreshed.
    pub async fn get_deployment_status(&mut self, model: Option<&str>) -> Vec<ShardDeployment> {
        let ids = self.store.ids_matching(model);
        let mut refreshed = Vec::with_capacity(ids.len());

        for id in ids {
            let Some(namespace) = self.store.get(&id).map(|r| r.namespace.clone()) else {
                continue;
            };
            let result = self.gateway.read_deployment(&id, &namespace).await;

            let Some(record) = self.store.get_mut(&id) else {
                continue;
            };
            match result {
                Ok(state) => {
                    record.apply_state(&state);
                    debug!(
                        "{}: {} ({}/{} ready)",
                        id, record.status, record.ready_replicas, record.replicas
                    );
                }
                Err(e) => {
                    warn!("Failed to read status of deployment {}: {}", id, e);
                    record.status = ShardStatus::Unknown;
                }
            }
            refreshed.push(record.clone());
        }

        refreshed
    }

    /// Delete every gateway deployment labeled with `model`
    ///
    /// Stops at the first failed delete. Deletions that already happened are
    /// not rolled back. Returns the number of deployments deleted.
    pub async fn cleanup_model_deployment(&mut self, model: &str) -> Result<usize, ShardError> {
        let namespace = self.config.namespace.clone();
        let deployments = self
            .gateway
            .list_deployments_by_label(&namespace, MODEL_LABEL, model)
            .await
            .map_err(|e| {
                error!("Failed to list deployments of model {}: {}", model, e);
                ShardError::from(e)
            })?;

        let mut deleted = 0;
        for deployment in deployments {
            if let Err(e) = self
                .gateway
                .delete_deployment(&deployment.name, &deployment.namespace)
                .await
            {
                error!(
                    "Cleanup of model {} stopped at deployment {}: {}",
                    model, deployment.name, e
                );
                return Err(if deleted == 0 {
                    ShardError::Gateway(e)
                } else {
                    ShardError::PartialFailure {
                        operation: "cleanup",
                        succeeded: deleted,
                        failed: vec![deployment.name],
                    }
                });
            }

            self.store.remove(&deployment.name);
            deleted += 1;
            info!("Deleted deployment {}", deployment.name);
        }

        info!("Cleaned up {} deployment(s) of model {}", deleted, model);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cluster::Node;
    use crate::gateway::{GatewayCall, InMemoryGateway};

    fn workers(n: usize) -> Vec<Node> {
        (1..=n)
            .map(|i| Node::new(format!("worker-{}", i)).worker().ready(true))
            .collect()
    }

    fn setup(nodes: Vec<Node>) -> (Arc<InMemoryGateway>, DeploymentOrchestrator) {
        let gateway = Arc::new(InMemoryGateway::with_nodes(nodes));
        let orchestrator = DeploymentOrchestrator::new(
            gateway.clone(),
            DeploymentStore::new(),
            OrchestratorConfig::default(),
        );
        (gateway, orchestrator)
    }

    #[tokio::test]
    async fn test_deploy_model_creates_record() {
        let (gateway, mut orch) = setup(workers(1));

        assert!(orch.deploy_model("bert", "v1", "worker-1", "img:1").await);

        let record = orch.store().get("bert-v1").unwrap();
        assert_eq!(record.status, ShardStatus::Deploying);
        assert_eq!(record.node, "worker-1");
        assert_eq!(record.base_model, "bert");

        let spec = gateway.deployment_spec("bert-v1").unwrap();
        assert_eq!(spec.replicas, 1);
        assert_eq!(spec.port, DEFAULT_SERVICE_PORT);
        assert_eq!(spec.node_name, "worker-1");
        assert_eq!(spec.labels.get("app"), Some(&"bert".to_string()));
        assert_eq!(spec.labels.get("version"), Some(&"v1".to_string()));
    }

    #[tokio::test]
    async fn test_deploy_model_failure_creates_no_record() {
        let (gateway, mut orch) = setup(workers(1));
        gateway.fail_create("bert-v1");

        assert!(!orch.deploy_model("bert", "v1", "worker-1", "img:1").await);
        assert!(orch.store().is_empty());

        let result = orch.try_deploy_model("bert", "v1", "worker-1", "img:1").await;
        match result {
            Err(ShardError::Deployment { name, .. }) => assert_eq!(name, "bert-v1"),
            other => panic!("Expected Deployment error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_distributed_insufficient_capacity() {
        let (gateway, mut orch) = setup(workers(2));

        let result = orch.deploy_distributed_model("llama", "v1", "img", 3).await;

        assert!(result.is_empty());
        assert_eq!(gateway.create_count(), 0);
        assert!(orch.store().is_empty());

        let result = orch
            .try_deploy_distributed_model("llama", "v1", "img", 3)
            .await;
        assert!(matches!(
            result,
            Err(ShardError::InsufficientCapacity {
                requested: 3,
                available: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_distributed_deploy_maps_shards_to_distinct_nodes() {
        let (gateway, mut orch) = setup(workers(4));

        let result = orch.deploy_distributed_model("llama", "v1", "img", 3).await;

        assert_eq!(result.len(), 3);
        assert_eq!(result.get("llama-shard0"), Some(&"worker-1".to_string()));
        assert_eq!(result.get("llama-shard1"), Some(&"worker-2".to_string()));
        assert_eq!(result.get("llama-shard2"), Some(&"worker-3".to_string()));

        // Issued strictly in shard order
        let created: Vec<String> = gateway
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::CreateDeployment { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(
            created,
            vec!["llama-shard0-v1", "llama-shard1-v1", "llama-shard2-v1"]
        );

        let spec = gateway.deployment_spec("llama-shard1-v1").unwrap();
        assert_eq!(spec.labels.get(MODEL_LABEL), Some(&"llama".to_string()));
        assert_eq!(spec.container_name, "llama-shard1");
    }

    #[tokio::test]
    async fn test_distributed_deploy_omits_failed_shard() {
        let (gateway, mut orch) = setup(workers(3));
        gateway.fail_create("llama-shard1-v1");

        let outcome = orch
            .try_deploy_distributed_model("llama", "v1", "img", 3)
            .await
            .unwrap();

        assert!(outcome.is_partial());
        assert_eq!(outcome.failed, vec!["llama-shard1"]);
        assert_eq!(outcome.shards.len(), 2);
        assert!(!outcome.shards.contains_key("llama-shard1"));
        assert_eq!(gateway.create_count(), 3);
        assert_eq!(orch.store().len(), 2);
    }

    #[tokio::test]
    async fn test_status_reconciliation() {
        let (gateway, mut orch) = setup(workers(3));
        orch.deploy_distributed_model("llama", "v1", "img", 3).await;

        gateway.set_replicas("llama-shard0-v1", 1, 1);
        gateway.set_replicas("llama-shard1-v1", 0, 0);

        let statuses = orch.get_deployment_status(Some("llama")).await;
        assert_eq!(statuses.len(), 3);

        let by_id: BTreeMap<_, _> = statuses.iter().map(|r| (r.id.as_str(), r.status)).collect();
        assert_eq!(by_id["llama-shard0-v1"], ShardStatus::Ready);
        assert_eq!(by_id["llama-shard1-v1"], ShardStatus::Failed);
        assert_eq!(by_id["llama-shard2-v1"], ShardStatus::Failed);

        assert_eq!(
            orch.store().get("llama-shard0-v1").unwrap().status,
            ShardStatus::Ready
        );
    }

    #[tokio::test]
    async fn test_status_read_failure_marks_unknown_only() {
        let (gateway, mut orch) = setup(workers(2));
        orch.deploy_distributed_model("llama", "v1", "img", 2).await;
        gateway.mark_all_ready();
        gateway.fail_read("llama-shard0-v1");

        let statuses = orch.get_deployment_status(None).await;

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].status, ShardStatus::Unknown);
        assert_eq!(statuses[1].status, ShardStatus::Ready);
    }

    #[tokio::test]
    async fn test_status_filter_excludes_other_models() {
        let (_, mut orch) = setup(workers(2));
        orch.deploy_model("bert", "v1", "worker-1", "img").await;
        orch.deploy_model("gpt", "v1", "worker-2", "img").await;

        let statuses = orch.get_deployment_status(Some("bert")).await;
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].model_name, "bert");
    }

    #[tokio::test]
    async fn test_cleanup_removes_deployments_and_records() {
        let (gateway, mut orch) = setup(workers(3));
        orch.deploy_distributed_model("llama", "v1", "img", 2).await;
        orch.deploy_model("bert", "v1", "worker-3", "img").await;

        let deleted = orch.cleanup_model_deployment("llama").await.unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(gateway.deployment_names(), vec!["bert-v1"]);
        assert_eq!(orch.store().len(), 1);
        assert!(orch.store().get("bert-v1").is_some());
    }

    #[tokio::test]
    async fn test_cleanup_stops_at_first_failure() {
        let (gateway, mut orch) = setup(workers(3));
        orch.deploy_distributed_model("llama", "v1", "img", 3).await;
        gateway.fail_delete("llama-shard1-v1");

        let result = orch.cleanup_model_deployment("llama").await;

        match result {
            Err(ShardError::PartialFailure {
                succeeded, failed, ..
            }) => {
                assert_eq!(succeeded, 1);
                assert_eq!(failed, vec!["llama-shard1-v1"]);
            }
            other => panic!("Expected PartialFailure, got {:?}", other),
        }

        // shard0 stays deleted, shard2 was never attempted
        assert_eq!(
            gateway.deployment_names(),
            vec!["llama-shard1-v1", "llama-shard2-v1"]
        );
        assert!(orch.store().get("llama-shard0-v1").is_none());
        assert_eq!(orch.store().len(), 2);
    }

    #[tokio::test]
    async fn test_cleanup_first_delete_fails() {
        let (gateway, mut orch) = setup(workers(1));
        orch.deploy_model("bert", "v1", "worker-1", "img").await;
        gateway.fail_delete("bert-v1");

        let result = orch.cleanup_model_deployment("bert").await;
        assert!(matches!(result, Err(ShardError::Gateway(_))));
        assert_eq!(orch.store().len(), 1);
    }

    #[tokio::test]
    async fn test_custom_namespace_and_port() {
        let gateway = Arc::new(InMemoryGateway::with_nodes(workers(1)));
        let mut orch = DeploymentOrchestrator::new(
            gateway.clone(),
            DeploymentStore::new(),
            OrchestratorConfig {
                namespace: "inference".to_string(),
                service_port: 9000,
            },
        );

        assert!(orch.deploy_model("bert", "v2", "worker-1", "img").await);

        let spec = gateway.deployment_spec("bert-v2").unwrap();
        assert_eq!(spec.namespace, "inference");
        assert_eq!(spec.port, 9000);

        let statuses = orch.get_deployment_status(Some("bert")).await;
        assert_eq!(statuses[0].status, ShardStatus::Failed);
    }
}
