//! Node registry - read-only view over the gateway's node listing

use tracing::debug;

use super::node::Node;
use crate::gateway::{GatewayError, SharedGateway};

/// Queries and classifies cluster nodes
///
/// Holds no node state: every call is a fresh gateway listing.
#[derive(Clone)]
pub struct NodeRegistry {
    gateway: SharedGateway,
}

impl NodeRegistry {
    pub fn new(gateway: SharedGateway) -> Self {
        Self { gateway }
    }

    /// List all nodes in the gateway's order
    pub async fn list_nodes(&self) -> Result<Vec<Node>, GatewayError> {
        let nodes = self.gateway.list_nodes().await?;
        debug!("Listed {} nodes", nodes.len());
        Ok(nodes)
    }

    /// Names of nodes that are Ready, schedulable and labeled `node-type=worker`
    ///
    /// Order follows the gateway listing.
    pub async fn list_available_worker_nodes(&self) -> Result<Vec<String>, GatewayError> {
        let available: Vec<String> = self
            .list_nodes()
            .await?
            .into_iter()
            .filter(Node::is_available_worker)
            .map(|n| n.name)
            .collect();

        debug!("{} available worker node(s)", available.len());
        Ok(available)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cluster::{NodeCondition, WORKER_LABEL_KEY};
    use crate::gateway::InMemoryGateway;

    fn registry(nodes: Vec<Node>) -> NodeRegistry {
        NodeRegistry::new(Arc::new(InMemoryGateway::with_nodes(nodes)))
    }

    #[tokio::test]
    async fn test_list_nodes_is_fresh_each_call() {
        let gateway = Arc::new(InMemoryGateway::with_nodes(vec![Node::new("n1")]));
        let registry = NodeRegistry::new(gateway.clone());

        assert_eq!(registry.list_nodes().await.unwrap().len(), 1);

        gateway.add_node(Node::new("n2"));
        assert_eq!(registry.list_nodes().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_available_workers_keep_gateway_order() {
        let registry = registry(vec![
            Node::new("w3").worker().ready(true),
            Node::new("w1").worker().ready(true),
            Node::new("w2").worker().ready(true),
        ]);

        let names = registry.list_available_worker_nodes().await.unwrap();
        assert_eq!(names, vec!["w3", "w1", "w2"]);
    }

    #[tokio::test]
    async fn test_available_workers_every_attribute_combination() {
        // Every combination of (ready condition, schedulable, worker label)
        let mut nodes = Vec::new();
        let mut expected = Vec::new();

        for bits in 0u8..16 {
            let ready = bits & 1 != 0;
            let has_ready_condition = bits & 2 != 0;
            let schedulable = bits & 4 != 0;
            let worker = bits & 8 != 0;

            let name = format!("node-{}", bits);
            let mut node = Node::new(&name)
                .with_condition(NodeCondition::new("MemoryPressure", !ready));
            if has_ready_condition {
                node = node.ready(ready);
            }
            if !schedulable {
                node = node.cordon();
            }
            node = if worker {
                node.worker()
            } else {
                node.with_label(WORKER_LABEL_KEY, "control-plane")
            };

            if has_ready_condition && ready && schedulable && worker {
                expected.push(name);
            }
            nodes.push(node);
        }

        let registry = registry(nodes);
        let names = registry.list_available_worker_nodes().await.unwrap();

        assert_eq!(names, expected);
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_no_nodes() {
        let registry = registry(vec![]);
        assert!(registry
            .list_available_worker_nodes()
            .await
            .unwrap()
            .is_empty());
    }
}
