//! HTTP gateway against a Kubernetes-compatible REST API

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ClusterGateway, DeploymentRef, DeploymentSpec, DeploymentState, GatewayError, Pod};
use crate::cluster::{Node, NodeCondition, NodePatch};

const MERGE_PATCH: &str = "application/merge-patch+json";

// ============================================================================
// Wire types (subset of the Kubernetes object model)
// ============================================================================

#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectMeta {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
    #[serde(default)]
    deletion_grace_period_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireNode {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: WireNodeSpec,
    #[serde(default)]
    status: WireNodeStatus,
}

#[derive(Debug, Default, Deserialize)]
struct WireNodeSpec {
    #[serde(default)]
    unschedulable: bool,
}

#[derive(Debug, Default, Deserialize)]
struct WireNodeStatus {
    #[serde(default)]
    conditions: Vec<NodeCondition>,
}

#[derive(Debug, Deserialize)]
struct WirePod {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: WirePodSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePodSpec {
    #[serde(default)]
    node_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDeployment {
    #[serde(default)]
    metadata: ObjectMeta,
    #[serde(default)]
    spec: WireDeploymentSpec,
    #[serde(default)]
    status: WireDeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
struct WireDeploymentSpec {
    #[serde(default)]
    replicas: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDeploymentStatus {
    #[serde(default)]
    ready_replicas: Option<u32>,
    #[serde(default)]
    available_replicas: Option<u32>,
}

impl From<WireNode> for Node {
    fn from(wire: WireNode) -> Self {
        Node {
            name: wire.metadata.name,
            labels: wire.metadata.labels.unwrap_or_default(),
            conditions: wire.status.conditions,
            schedulable: !wire.spec.unschedulable,
        }
    }
}

impl From<WireDeployment> for DeploymentState {
    fn from(wire: WireDeployment) -> Self {
        DeploymentState {
            // Kubernetes defaults an omitted replica count to 1
            replicas: wire.spec.replicas.unwrap_or(1),
            ready_replicas: wire.status.ready_replicas.unwrap_or(0),
            available_replicas: wire.status.available_replicas.unwrap_or(0),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Gateway backed by the cluster's REST API
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    server: String,
    token: Option<String>,
}

impl HttpGateway {
    pub fn new(server: impl Into<String>, token: Option<String>) -> Result<Self, GatewayError> {
        Self::with_timeout(server, token, Duration::from_secs(30))
    }

    pub fn with_timeout(
        server: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            client,
            server: server.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(
        &self,
        req: RequestBuilder,
        kind: &'static str,
        name: &str,
    ) -> Result<Response, GatewayError> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound {
                kind,
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        kind: &'static str,
        name: &str,
    ) -> Result<T, GatewayError> {
        self.send(req, kind, name)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ClusterGateway for HttpGateway {
    async fn list_nodes(&self) -> Result<Vec<Node>, GatewayError> {
        debug!("GET {}/api/v1/nodes", self.server);
        let req = self.client.get(self.url("/api/v1/nodes"));
        let list: ObjectList<WireNode> = self.send_json(req, "NodeList", "").await?;
        Ok(list.items.into_iter().map(Node::from).collect())
    }

    async fn patch_node(&self, name: &str, patch: &NodePatch) -> Result<(), GatewayError> {
        let body = patch.to_merge_patch();
        debug!("PATCH node {}: {}", name, body);
        let req = self
            .client
            .patch(self.url(&format!("/api/v1/nodes/{}", name)))
            .header(reqwest::header::CONTENT_TYPE, MERGE_PATCH)
            .body(body.to_string());
        self.send(req, "Node", name).await?;
        Ok(())
    }

    async fn list_pods_by_node(&self, node_name: &str) -> Result<Vec<Pod>, GatewayError> {
        let req = self
            .client
            .get(self.url("/api/v1/pods"))
            .query(&[("fieldSelector", format!("spec.nodeName={}", node_name))]);
        let list: ObjectList<WirePod> = self.send_json(req, "PodList", node_name).await?;

        Ok(list
            .items
            .into_iter()
            .map(|p| Pod {
                name: p.metadata.name,
                namespace: p.metadata.namespace.unwrap_or_else(|| "default".to_string()),
                node_name: p.spec.node_name.unwrap_or_else(|| node_name.to_string()),
                deletion_grace_period_seconds: p.metadata.deletion_grace_period_seconds,
            })
            .collect())
    }

    async fn evict_pod(
        &self,
        name: &str,
        namespace: &str,
        grace_period_seconds: i64,
    ) -> Result<(), GatewayError> {
        debug!(
            "DELETE pod {}/{} (grace period {}s)",
            namespace, name, grace_period_seconds
        );
        let body = json!({
            "apiVersion": "v1",
            "kind": "DeleteOptions",
            "gracePeriodSeconds": grace_period_seconds,
        });
        let req = self
            .client
            .delete(self.url(&format!("/api/v1/namespaces/{}/pods/{}", namespace, name)))
            .json(&body);
        self.send(req, "Pod", name).await?;
        Ok(())
    }

    async fn create_deployment(&self, spec: &DeploymentSpec) -> Result<(), GatewayError> {
        debug!(
            "POST deployment {}/{} pinned to {}",
            spec.namespace, spec.name, spec.node_name
        );
        let req = self
            .client
            .post(self.url(&format!(
                "/apis/apps/v1/namespaces/{}/deployments",
                spec.namespace
            )))
            .json(&spec.to_manifest());
        self.send(req, "Deployment", &spec.name).await?;
        Ok(())
    }

    async fn read_deployment(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<DeploymentState, GatewayError> {
        let req = self.client.get(self.url(&format!(
            "/apis/apps/v1/namespaces/{}/deployments/{}",
            namespace, name
        )));
        let wire: WireDeployment = self.send_json(req, "Deployment", name).await?;
        Ok(wire.into())
    }

    async fn list_deployments_by_label(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<Vec<DeploymentRef>, GatewayError> {
        let req = self
            .client
            .get(self.url(&format!(
                "/apis/apps/v1/namespaces/{}/deployments",
                namespace
            )))
            .query(&[("labelSelector", format!("{}={}", key, value))]);
        let list: ObjectList<WireDeployment> =
            self.send_json(req, "DeploymentList", value).await?;

        Ok(list
            .items
            .into_iter()
            .map(|d| DeploymentRef {
                name: d.metadata.name,
                namespace: d
                    .metadata
                    .namespace
                    .unwrap_or_else(|| namespace.to_string()),
                labels: d
                    .metadata
                    .labels
                    .unwrap_or_default()
                    .into_iter()
                    .collect::<BTreeMap<_, _>>(),
            })
            .collect())
    }

    async fn delete_deployment(&self, name: &str, namespace: &str) -> Result<(), GatewayError> {
        debug!("DELETE deployment {}/{}", namespace, name);
        let req = self.client.delete(self.url(&format!(
            "/apis/apps/v1/namespaces/{}/deployments/{}",
            namespace, name
        )));
        self.send(req, "Deployment", name).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_from_wire() {
        let json = r#"{
            "metadata": {"name": "worker-1", "labels": {"node-type": "worker"}},
            "spec": {"unschedulable": true},
            "status": {"conditions": [
                {"type": "Ready", "status": "True", "reason": "KubeletReady"},
                {"type": "DiskPressure", "status": "False"}
            ]}
        }"#;

        let wire: WireNode = serde_json::from_str(json).unwrap();
        let node = Node::from(wire);

        assert_eq!(node.name, "worker-1");
        assert!(node.is_ready());
        assert!(node.is_worker());
        assert!(!node.schedulable);
    }

    #[test]
    fn test_node_without_spec_is_schedulable() {
        let wire: WireNode = serde_json::from_str(r#"{"metadata": {"name": "n"}}"#).unwrap();
        let node = Node::from(wire);
        assert!(node.schedulable);
        assert!(node.labels.is_empty());
    }

    #[test]
    fn test_deployment_state_from_wire() {
        let json = r#"{
            "metadata": {"name": "m-shard0-v1"},
            "spec": {"replicas": 1},
            "status": {"readyReplicas": 1, "availableReplicas": 1}
        }"#;
        let wire: WireDeployment = serde_json::from_str(json).unwrap();
        let state = DeploymentState::from(wire);

        assert_eq!(state.replicas, 1);
        assert_eq!(state.ready_replicas, 1);
        assert_eq!(state.available_replicas, 1);
    }

    #[test]
    fn test_deployment_state_missing_status() {
        let wire: WireDeployment =
            serde_json::from_str(r#"{"metadata": {"name": "x"}, "spec": {}}"#).unwrap();
        let state = DeploymentState::from(wire);

        assert_eq!(state.replicas, 1);
        assert_eq!(state.ready_replicas, 0);
        assert_eq!(state.available_replicas, 0);
    }

    #[test]
    fn test_pod_list_parsing() {
        let json = r#"{"items": [
            {"metadata": {"name": "a", "namespace": "kube-system"}, "spec": {"nodeName": "n1"}},
            {"metadata": {"name": "b", "namespace": "default", "deletionGracePeriodSeconds": 30}}
        ]}"#;
        let list: ObjectList<WirePod> = serde_json::from_str(json).unwrap();

        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[1].metadata.deletion_grace_period_seconds, Some(30));
    }

    #[test]
    fn test_server_trailing_slash_trimmed() {
        let gateway = HttpGateway::new("http://127.0.0.1:8001/", None).unwrap();
        assert_eq!(gateway.server(), "http://127.0.0.1:8001");
        assert_eq!(
            gateway.url("/api/v1/nodes"),
            "http://127.0.0.1:8001/api/v1/nodes"
        );
    }
}
