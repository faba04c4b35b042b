//! Node lifecycle operations
//!
//! Labeling, cordoning and draining mutate cluster state through the gateway.
//! None of these operations are atomic: a drain that is interrupted leaves
//! the node with some pods evicted and no cordon, and nothing is rolled back.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use super::node::NodePatch;
use super::DRAIN_GRACE_PERIOD_SECS;
use crate::gateway::{GatewayError, SharedGateway};

/// Errors from node lifecycle operations
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Drain of node '{node}' incomplete: {}", drain_failure_detail(.failed_pods, .cordoned))]
    PartialFailure {
        node: String,
        failed_pods: Vec<String>,
        cordoned: bool,
    },
}

fn drain_failure_detail(failed_pods: &[String], cordoned: &bool) -> String {
    match (failed_pods.is_empty(), *cordoned) {
        (true, _) => "all pods evicted but the cordon failed".to_string(),
        (false, true) => format!("failed to evict {}", failed_pods.join(", ")),
        (false, false) => format!(
            "failed to evict {} and the cordon failed",
            failed_pods.join(", ")
        ),
    }
}

/// Outcome of a successful drain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub node: String,
    /// Pods evicted, as namespace/name
    pub evicted: Vec<String>,
    /// Pods skipped because they were already terminating
    pub skipped: Vec<String>,
}

/// Applies lifecycle changes to individual nodes
#[derive(Clone)]
pub struct NodeLifecycleController {
    gateway: SharedGateway,
}

impl NodeLifecycleController {
    pub fn new(gateway: SharedGateway) -> Self {
        Self { gateway }
    }

    /// Merge the given labels onto a node, overwriting existing keys
    pub async fn label_node(
        &self,
        name: &str,
        labels: HashMap<String, String>,
    ) -> Result<(), LifecycleError> {
        let summary = format!("{:?}", labels);
        if let Err(e) = self.gateway.patch_node(name, &NodePatch::Labels(labels)).await {
            warn!("Failed to label node {}: {}", name, e);
            return Err(e.into());
        }
        info!("Applied labels {} to node {}", summary, name);
        Ok(())
    }

    /// Mark a node unschedulable
    pub async fn cordon_node(&self, name: &str) -> Result<(), LifecycleError> {
        self.set_schedulable(name, false).await?;
        info!("Node {} cordoned", name);
        Ok(())
    }

    /// Mark a node schedulable again
    pub async fn uncordon_node(&self, name: &str) -> Result<(), LifecycleError> {
        self.set_schedulable(name, true).await?;
        info!("Node {} uncordoned", name);
        Ok(())
    }

    async fn set_schedulable(&self, name: &str, schedulable: bool) -> Result<(), LifecycleError> {
        self.gateway
            .patch_node(name, &NodePatch::Schedulable(schedulable))
            .await
            .map_err(|e| {
                warn!(
                    "Failed to set schedulable={} on node {}: {}",
                    schedulable, name, e
                );
                LifecycleError::from(e)
            })
    }

    /// Evict every pod on the node that is not already terminating, then cordon it
    ///
    /// A failed eviction does not stop the drain: remaining pods are still
    /// evicted and the cordon is still attempted. Failures are reported
    /// together as [`LifecycleError::PartialFailure`].
    pub async fn drain_node(&self, name: &str) -> Result<DrainReport, LifecycleError> {
        let pods = self.gateway.list_pods_by_node(name).await.map_err(|e| {
            warn!("Failed to list pods on node {}: {}", name, e);
            LifecycleError::from(e)
        })?;

        let mut report = DrainReport {
            node: name.to_string(),
            ..Default::default()
        };
        let mut failed_pods = Vec::new();

        for pod in pods {
            let qualified = format!("{}/{}", pod.namespace, pod.name);
            if pod.is_terminating() {
                report.skipped.push(qualified);
                continue;
            }

            match self
                .gateway
                .evict_pod(&pod.name, &pod.namespace, DRAIN_GRACE_PERIOD_SECS)
                .await
            {
                Ok(()) => {
                    info!("Evicted pod {} from node {}", qualified, name);
                    report.evicted.push(qualified);
                }
                Err(e) => {
                    warn!("Failed to evict pod {} from node {}: {}", qualified, name, e);
                    failed_pods.push(qualified);
                }
            }
        }

        let cordoned = self.cordon_node(name).await.is_ok();

        if failed_pods.is_empty() && cordoned {
            Ok(report)
        } else {
            Err(LifecycleError::PartialFailure {
                node: name.to_string(),
                failed_pods,
                cordoned,
            })
        }
    }

    /// Warn about every node without a true Ready condition
    ///
    /// Returns the names of those nodes. Never mutates cluster state.
    pub async fn monitor_nodes(&self) -> Result<Vec<String>, LifecycleError> {
        let not_ready: Vec<String> = self
            .gateway
            .list_nodes()
            .await?
            .into_iter()
            .filter(|n| !n.is_ready())
            .map(|n| n.name)
            .collect();

        for name in &not_ready {
            warn!("Node {} is not Ready", name);
        }

        Ok(not_ready)
    }
}
