//! Tracked shard deployments

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gateway::DeploymentState;

/// Lifecycle status of a shard as last reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardStatus {
    /// Submitted, not yet fully ready
    Deploying,
    /// Ready replicas match the declared count
    Ready,
    /// No replica is available
    Failed,
    /// Last status read failed
    Unknown,
}

impl ShardStatus {
    /// Classify reported replica counts
    ///
    /// Ready wins over failed, so a zero-replica deployment counts as ready.
    pub fn from_state(state: &DeploymentState) -> Self {
        if state.ready_replicas == state.replicas {
            ShardStatus::Ready
        } else if state.available_replicas == 0 {
            ShardStatus::Failed
        } else {
            ShardStatus::Deploying
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShardStatus::Deploying => "deploying",
            ShardStatus::Ready => "ready",
            ShardStatus::Failed => "failed",
            ShardStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One shard deployment tracked by the orchestrator
///
/// The node is fixed at creation; shards never migrate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardDeployment {
    /// `{model_name}-{version}`, also the gateway deployment name
    pub id: String,

    /// Shard name (or model name for single deployments)
    pub model_name: String,

    /// Model this shard belongs to
    pub base_model: String,

    pub version: String,

    /// Node the shard is pinned to
    pub node: String,

    pub namespace: String,

    /// Declared replica count
    pub replicas: u32,

    pub status: ShardStatus,

    #[serde(rename = "readyReplicas")]
    pub ready_replicas: u32,

    #[serde(rename = "availableReplicas")]
    pub available_replicas: u32,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ShardDeployment {
    /// Deployment id for a model name and version
    pub fn deployment_id(model_name: &str, version: &str) -> String {
        format!("{}-{}", model_name, version)
    }

    /// True when this record is the given model, or one of its shards
    pub fn belongs_to(&self, model: &str) -> bool {
        self.model_name == model
            || self.base_model == model
            || self
                .model_name
                .strip_prefix(model)
                .is_some_and(|rest| rest.starts_with("-shard"))
    }

    pub fn is_ready(&self) -> bool {
        self.status == ShardStatus::Ready
    }

    /// Update counts and status from a gateway read
    pub fn apply_state(&mut self, state: &DeploymentState) {
        self.ready_replicas = state.ready_replicas;
        self.available_replicas = state.available_replicas;
        self.status = ShardStatus::from_state(state);
    }
}

/// In-memory registry of shard deployments
///
/// Owned by exactly one orchestrator, which is its only writer. Records are
/// kept ordered by id. Sharing a store across tasks requires wrapping its
/// owner in a lock.
#[derive(Debug, Clone, Default)]
pub struct DeploymentStore {
    records: BTreeMap<String, ShardDeployment>,
}

impl DeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, returning the previous one
    pub fn insert(&mut self, record: ShardDeployment) -> Option<ShardDeployment> {
        self.records.insert(record.id.clone(), record)
    }

    pub fn get(&self, id: &str) -> Option<&ShardDeployment> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ShardDeployment> {
        self.records.get_mut(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<ShardDeployment> {
        self.records.remove(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &ShardDeployment> {
        self.records.values()
    }

    /// Ids of records belonging to `model`, or all ids when `None`
    pub fn ids_matching(&self, model: Option<&str>) -> Vec<String> {
        self.records
            .values()
            .filter(|r| model.map_or(true, |m| r.belongs_to(m)))
            .map(|r| r.id.clone())
            .collect()
    }

    /// Ready records whose model name starts with `prefix`, ordered by id
    pub fn ready_with_prefix(&self, prefix: &str) -> Vec<&ShardDeployment> {
        self.records
            .values()
            .filter(|r| r.model_name.starts_with(prefix) && r.is_ready())
            .collect()
    }
}
