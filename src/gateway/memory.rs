//! In-memory cluster gateway
//!
//! Simulates a small cluster: nodes, pods and deployments live in a map
//! behind a mutex. Every call is recorded so tests can assert on the exact
//! gateway traffic, and individual operations can be told to fail.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    ClusterGateway, DeploymentRef, DeploymentSpec, DeploymentState, GatewayError, Pod,
};
use crate::cluster::{Node, NodePatch};

/// A recorded gateway call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    ListNodes,
    PatchNode { name: String, patch: NodePatch },
    ListPods { node: String },
    EvictPod {
        name: String,
        namespace: String,
        grace_period_seconds: i64,
    },
    CreateDeployment { name: String, node: String },
    ReadDeployment { name: String },
    ListDeployments { selector: String },
    DeleteDeployment { name: String },
}

#[derive(Debug, Clone)]
struct StoredDeployment {
    spec: DeploymentSpec,
    state: DeploymentState,
}

#[derive(Debug, Default)]
struct ClusterState {
    nodes: Vec<Node>,
    pods: Vec<Pod>,
    deployments: BTreeMap<(String, String), StoredDeployment>,
    calls: Vec<GatewayCall>,
    failing_creates: HashSet<String>,
    failing_reads: HashSet<String>,
    failing_evictions: HashSet<String>,
    failing_deletes: HashSet<String>,
    failing_patches: HashSet<String>,
}

/// Simulated cluster gateway
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<ClusterState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with nodes, kept in the given order
    pub fn with_nodes(nodes: Vec<Node>) -> Self {
        let gateway = Self::new();
        gateway.state().nodes = nodes;
        gateway
    }

    fn state(&self) -> MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_node(&self, node: Node) {
        self.state().nodes.push(node);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.state().pods.push(pod);
    }

    /// Current snapshot of a node
    pub fn node(&self, name: &str) -> Option<Node> {
        self.state().nodes.iter().find(|n| n.name == name).cloned()
    }

    pub fn pods_on(&self, node_name: &str) -> Vec<Pod> {
        self.state()
            .pods
            .iter()
            .filter(|p| p.node_name == node_name)
            .cloned()
            .collect()
    }

    /// Names of all deployments, sorted
    pub fn deployment_names(&self) -> Vec<String> {
        self.state()
            .deployments
            .keys()
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Spec of a deployment as it was submitted
    pub fn deployment_spec(&self, name: &str) -> Option<DeploymentSpec> {
        self.state()
            .deployments
            .values()
            .find(|d| d.spec.name == name)
            .map(|d| d.spec.clone())
    }

    /// Set reported replica counts for a deployment
    pub fn set_replicas(&self, name: &str, ready: u32, available: u32) {
        for d in self.state().deployments.values_mut() {
            if d.spec.name == name {
                d.state.ready_replicas = ready;
                d.state.available_replicas = available;
            }
        }
    }

    /// Report every deployment as fully rolled out
    pub fn mark_all_ready(&self) {
        for d in self.state().deployments.values_mut() {
            d.state.ready_replicas = d.state.replicas;
            d.state.available_replicas = d.state.replicas;
        }
    }

    /// Make `create_deployment` fail for this deployment name
    pub fn fail_create(&self, name: impl Into<String>) {
        self.state().failing_creates.insert(name.into());
    }

    /// Make `read_deployment` fail for this deployment name
    pub fn fail_read(&self, name: impl Into<String>) {
        self.state().failing_reads.insert(name.into());
    }

    /// Make `evict_pod` fail for this pod name
    pub fn fail_eviction(&self, pod: impl Into<String>) {
        self.state().failing_evictions.insert(pod.into());
    }

    /// Make `delete_deployment` fail for this deployment name
    pub fn fail_delete(&self, name: impl Into<String>) {
        self.state().failing_deletes.insert(name.into());
    }

    /// Make `patch_node` fail for this node name
    pub fn fail_patch(&self, node: impl Into<String>) {
        self.state().failing_patches.insert(node.into());
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    /// Number of `create_deployment` calls received
    pub fn create_count(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::CreateDeployment { .. }))
    }

    /// Number of `evict_pod` calls received
    pub fn eviction_count(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::EvictPod { .. }))
    }

    pub fn count(&self, pred: impl Fn(&GatewayCall) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(*c)).count()
    }

    fn record(&self, call: GatewayCall) -> MutexGuard<'_, ClusterState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

fn rejected(what: &str, name: &str) -> GatewayError {
    GatewayError::Rejected(format!("simulated failure for {} '{}'", what, name))
}

#[async_trait]
impl ClusterGateway for InMemoryGateway {
    async fn list_nodes(&self) -> Result<Vec<Node>, GatewayError> {
        let state = self.record(GatewayCall::ListNodes);
        Ok(state.nodes.clone())
    }

    async fn patch_node(&self, name: &str, patch: &NodePatch) -> Result<(), GatewayError> {
        let mut state = self.record(GatewayCall::PatchNode {
            name: name.to_string(),
            patch: patch.clone(),
        });
        if state.failing_patches.contains(name) {
            return Err(rejected("node", name));
        }

        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.name == name)
            .ok_or_else(|| GatewayError::NotFound {
                kind: "Node",
                name: name.to_string(),
            })?;
        patch.apply(node);
        Ok(())
    }

    async fn list_pods_by_node(&self, node_name: &str) -> Result<Vec<Pod>, GatewayError> {
        let state = self.record(GatewayCall::ListPods {
            node: node_name.to_string(),
        });
        Ok(state
            .pods
            .iter()
            .filter(|p| p.node_name == node_name)
            .cloned()
            .collect())
    }

    async fn evict_pod(
        &self,
        name: &str,
        namespace: &str,
        grace_period_seconds: i64,
    ) -> Result<(), GatewayError> {
        let mut state = self.record(GatewayCall::EvictPod {
            name: name.to_string(),
            namespace: namespace.to_string(),
            grace_period_seconds,
        });
        if state.failing_evictions.contains(name) {
            return Err(rejected("pod", name));
        }

        let before = state.pods.len();
        state
            .pods
            .retain(|p| !(p.name == name && p.namespace == namespace));
        if state.pods.len() == before {
            return Err(GatewayError::NotFound {
                kind: "Pod",
                name: name.to_string(),
            });
        }
        Ok(())
    }

    async fn create_deployment(&self, spec: &DeploymentSpec) -> Result<(), GatewayError> {
        let mut state = self.record(GatewayCall::CreateDeployment {
            name: spec.name.clone(),
            node: spec.node_name.clone(),
        });
        if state.failing_creates.contains(&spec.name) {
            return Err(rejected("deployment", &spec.name));
        }

        let key = (spec.namespace.clone(), spec.name.clone());
        if state.deployments.contains_key(&key) {
            return Err(GatewayError::Api {
                status: 409,
                message: format!("deployment '{}' already exists", spec.name),
            });
        }

        // Fresh deployments report nothing ready yet
        state.deployments.insert(
            key,
            StoredDeployment {
                spec: spec.clone(),
                state: DeploymentState {
                    replicas: spec.replicas,
                    ready_replicas: 0,
                    available_replicas: 0,
                },
            },
        );
        Ok(())
    }

    async fn read_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<DeploymentState, GatewayError> {
        let state = self.record(GatewayCall::ReadDeployment {
            name: name.to_string(),
        });
        if state.failing_reads.contains(name) {
            return Err(rejected("deployment", name));
        }

        state
            .deployments
            .get(&(namespace.to_string(), name.to_string()))
            .map(|d| d.state)
            .ok_or_else(|| GatewayError::NotFound {
                kind: "Deployment",
                name: name.to_string(),
            })
    }

    async fn list_deployments_by_label(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<DeploymentRef>, GatewayError> {
        let state = self.record(GatewayCall::ListDeployments {
            selector: format!("{}={}", key, value),
        });
        Ok(state
            .deployments
            .values()
            .filter(|d| d.spec.namespace == namespace)
            .filter(|d| d.spec.labels.get(key).map(String::as_str) == Some(value))
            .map(|d| DeploymentRef {
                name: d.spec.name.clone(),
                namespace: d.spec.namespace.clone(),
                labels: d.spec.labels.clone(),
            })
            .collect())
    }

    async fn delete_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError> {
        let mut state = self.record(GatewayCall::DeleteDeployment {
            name: name.to_string(),
        });
        if state.failing_deletes.contains(name) {
            return Err(rejected("deployment", name));
        }

        state
            .deployments
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| GatewayError::NotFound {
                kind: "Deployment",
                name: name.to_string(),
            })
    }
}
