//! Node snapshot - a worker machine as reported by the cluster gateway
//!
//! The core never owns nodes. Every `Node` value is a transient snapshot
//! taken from a gateway listing; changes go back through the gateway as
//! patches (see [`NodePatch`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{READY_CONDITION, WORKER_LABEL_KEY, WORKER_LABEL_VALUE};

/// A node in the cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node name
    pub name: String,

    /// Labels used for classification and selection
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Reported conditions (Ready, DiskPressure, ...)
    #[serde(default)]
    pub conditions: Vec<NodeCondition>,

    /// Whether new workloads may be scheduled here
    #[serde(default = "default_true")]
    pub schedulable: bool,
}

fn default_true() -> bool {
    true
}

/// A condition of a Node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCondition {
    /// Type of condition, e.g. "Ready" or "MemoryPressure"
    #[serde(rename = "type")]
    pub condition_type: String,

    /// Status: True, False, Unknown
    pub status: String,
}

impl NodeCondition {
    pub fn new(condition_type: impl Into<String>, status: bool) -> Self {
        Self {
            condition_type: condition_type.into(),
            status: if status { "True" } else { "False" }.to_string(),
        }
    }

    /// Create a Ready condition
    pub fn ready(status: bool) -> Self {
        Self::new(READY_CONDITION, status)
    }

    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

/// A partial update applied to a node through the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePatch {
    /// Merge (add or overwrite) the given label keys
    Labels(HashMap<String, String>),
    /// Set the schedulable flag
    Schedulable(bool),
}

impl NodePatch {
    /// Render as a JSON merge patch for a Kubernetes-style node object
    pub fn to_merge_patch(&self) -> serde_json::Value {
        match self {
            NodePatch::Labels(labels) => json!({ "metadata": { "labels": labels } }),
            NodePatch::Schedulable(schedulable) => {
                json!({ "spec": { "unschedulable": !schedulable } })
            }
        }
    }

    /// Apply the patch to a local snapshot
    pub fn apply(&self, node: &mut Node) {
        match self {
            NodePatch::Labels(labels) => {
                for (k, v) in labels {
                    node.labels.insert(k.clone(), v.clone());
                }
            }
            NodePatch::Schedulable(schedulable) => node.schedulable = *schedulable,
        }
    }
}

impl Node {
    /// Create a schedulable node with no labels and no conditions
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: HashMap::new(),
            conditions: vec![],
            schedulable: true,
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Label as a worker (`node-type=worker`)
    pub fn worker(self) -> Self {
        self.with_label(WORKER_LABEL_KEY, WORKER_LABEL_VALUE)
    }

    /// Add a condition
    pub fn with_condition(mut self, condition: NodeCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a Ready condition with the given status
    pub fn ready(self, status: bool) -> Self {
        self.with_condition(NodeCondition::ready(status))
    }

    /// Mark as unschedulable (cordon)
    pub fn cordon(mut self) -> Self {
        self.schedulable = false;
        self
    }

    /// True when a Ready condition is present with status True
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.condition_type == READY_CONDITION && c.is_true())
    }

    /// True when labeled `node-type=worker`
    pub fn is_worker(&self) -> bool {
        self.labels.get(WORKER_LABEL_KEY).map(String::as_str) == Some(WORKER_LABEL_VALUE)
    }

    /// Ready, schedulable and worker-labeled
    pub fn is_available_worker(&self) -> bool {
        self.is_ready() && self.schedulable && self.is_worker()
    }

    /// Types of conditions currently true
    pub fn active_conditions(&self) -> Vec<&str> {
        self.conditions
            .iter()
            .filter(|c| c.is_true())
            .map(|c| c.condition_type.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_node() {
        let node = Node::new("node-1");

        assert_eq!(node.name, "node-1");
        assert!(node.schedulable);
        assert!(node.labels.is_empty());
        assert!(!node.is_ready());
    }

    #[test]
    fn test_node_builder() {
        let node = Node::new("gpu-node")
            .worker()
            .with_label("gpu", "true")
            .ready(true);

        assert!(node.is_worker());
        assert!(node.is_ready());
        assert_eq!(node.labels.get("gpu"), Some(&"true".to_string()));
    }

    #[test]
    fn test_cordon() {
        let node = Node::new("node").worker().ready(true).cordon();
        assert!(!node.schedulable);
        assert!(!node.is_available_worker());
    }

    #[test]
    fn test_ready_requires_true_status() {
        let node = Node::new("node").ready(false);
        assert!(!node.is_ready());

        let node = Node::new("node")
            .with_condition(NodeCondition::new("DiskPressure", true))
            .ready(false);
        assert!(!node.is_ready());
        assert_eq!(node.active_conditions(), vec!["DiskPressure"]);
    }

    #[test]
    fn test_worker_label_value_must_match() {
        let node = Node::new("node").with_label(WORKER_LABEL_KEY, "control-plane");
        assert!(!node.is_worker());
    }

    #[test]
    fn test_cordon_patch_sets_unschedulable() {
        let patch = NodePatch::Schedulable(false).to_merge_patch();
        assert_eq!(patch, json!({ "spec": { "unschedulable": true } }));

        let patch = NodePatch::Schedulable(true).to_merge_patch();
        assert_eq!(patch, json!({ "spec": { "unschedulable": false } }));
    }

    #[test]
    fn test_label_patch() {
        let mut labels = HashMap::new();
        labels.insert("inference-tier".to_string(), "primary".to_string());

        let patch = NodePatch::Labels(labels);
        assert_eq!(
            patch.to_merge_patch(),
            json!({ "metadata": { "labels": { "inference-tier": "primary" } } })
        );

        let mut node = Node::new("node").with_label("inference-tier", "secondary");
        patch.apply(&mut node);
        assert_eq!(node.labels.get("inference-tier"), Some(&"primary".to_string()));
    }

    #[test]
    fn test_deserialize_defaults() {
        let node: Node = serde_json::from_str(r#"{"name": "n1"}"#).unwrap();
        assert!(node.schedulable);
        assert!(node.conditions.is_empty());
    }
}
