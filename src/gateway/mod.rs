//! Cluster gateway - the boundary to the cluster control plane
//!
//! Everything shardnet knows about nodes, pods and deployments comes through
//! the [`ClusterGateway`] trait. Two implementations ship with the crate:
//!
//! - [`HttpGateway`]: talks to a Kubernetes-compatible REST API
//! - [`InMemoryGateway`]: a simulated cluster used by tests and `shardnet demo`

pub mod http;
pub mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::cluster::{Node, NodePatch};

pub use http::HttpGateway;
pub use memory::{GatewayCall, InMemoryGateway};

/// Label carrying the base model name on every shard deployment
pub const MODEL_LABEL: &str = "model";

/// Hostname label used to pin a deployment to one node
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Errors reported by the cluster gateway
///
/// The core does not branch on the variant; they exist for messages.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("JSON parse error: {0}")]
    Parse(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// A pod bound to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    pub node_name: String,

    /// Set once the pod has started terminating
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_grace_period_seconds: Option<i64>,
}

impl Pod {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            node_name: node_name.into(),
            deletion_grace_period_seconds: None,
        }
    }

    /// Mark as already terminating
    pub fn terminating(mut self, grace_period_seconds: i64) -> Self {
        self.deletion_grace_period_seconds = Some(grace_period_seconds);
        self
    }

    pub fn is_terminating(&self) -> bool {
        self.deletion_grace_period_seconds.is_some()
    }
}

/// One deployment unit submitted to the gateway
///
/// Always one container on one image, pinned to a single node by hostname,
/// exposing a single port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub name: String,
    pub namespace: String,
    pub container_name: String,
    pub image: String,
    pub port: u16,
    pub node_name: String,
    pub replicas: u32,
    pub labels: BTreeMap<String, String>,
}

impl DeploymentSpec {
    /// Selector labels `{app, version}`
    pub fn selector(&self) -> BTreeMap<String, String> {
        self.labels
            .iter()
            .filter(|(k, _)| k.as_str() == "app" || k.as_str() == "version")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Render as an `apps/v1` Deployment manifest
    pub fn to_manifest(&self) -> serde_json::Value {
        json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": self.name,
                "namespace": self.namespace,
                "labels": self.labels,
            },
            "spec": {
                "replicas": self.replicas,
                "selector": { "matchLabels": self.selector() },
                "template": {
                    "metadata": { "labels": self.labels },
                    "spec": {
                        "affinity": {
                            "nodeAffinity": {
                                "requiredDuringSchedulingIgnoredDuringExecution": {
                                    "nodeSelectorTerms": [{
                                        "matchExpressions": [{
                                            "key": HOSTNAME_LABEL,
                                            "operator": "In",
                                            "values": [self.node_name],
                                        }]
                                    }]
                                }
                            }
                        },
                        "containers": [{
                            "name": self.container_name,
                            "image": self.image,
                            "ports": [{ "containerPort": self.port }],
                        }]
                    }
                }
            }
        })
    }
}

/// Replica counts read back from the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Declared replica count
    pub replicas: u32,
    pub ready_replicas: u32,
    pub available_replicas: u32,
}

/// A deployment found by label query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRef {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Operations shardnet needs from the cluster control plane
///
/// All calls are awaited one at a time by the core; implementations need no
/// internal ordering guarantees beyond their own consistency.
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// List all nodes, in the control plane's order
    async fn list_nodes(&self) -> Result<Vec<Node>, GatewayError>;

    async fn patch_node(&self, name: &str, patch: &NodePatch) -> Result<(), GatewayError>;

    /// List pods bound to a node across all namespaces
    async fn list_pods_by_node(&self, node_name: &str) -> Result<Vec<Pod>, GatewayError>;

    async fn evict_pod(
        &self,
        name: &str,
        namespace: &str,
        grace_period_seconds: i64,
    ) -> Result<(), GatewayError>;

    async fn create_deployment(&self, spec: &DeploymentSpec) -> Result<(), GatewayError>;

    async fn read_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<DeploymentState, GatewayError>;

    /// List deployments in a namespace carrying `key=value`
    async fn list_deployments_by_label(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<DeploymentRef>, GatewayError>;

    async fn delete_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError>;
}

/// Gateway shared between components
pub type SharedGateway = Arc<dyn ClusterGateway>;
