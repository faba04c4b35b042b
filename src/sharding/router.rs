//! Inference routing over ready shards

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::balancer::RoundRobinBalancer;
use super::deployment::{DeploymentStore, ShardDeployment};
use super::ShardError;
use crate::metrics::PerformanceReport;

/// Where one request was sent, with a fabricated result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRouteDecision {
    #[serde(rename = "requestId")]
    pub request_id: Uuid,

    pub model: String,

    /// Id of the selected shard deployment
    pub shard: String,

    /// Node the selected shard is pinned to
    pub node: String,

    pub timestamp: DateTime<Utc>,

    pub result: Value,
}

// ============================================================================
// SBIO: Pure decision building
// ============================================================================

/// Build the decision for a chosen shard
///
/// No inference happens; the result echoes what was asked and where it went.
pub fn build_decision(model: &str, shard: &ShardDeployment, request: &Value) -> InferenceRouteDecision {
    let request_id = Uuid::new_v4();

    InferenceRouteDecision {
        request_id,
        model: model.to_string(),
        shard: shard.id.clone(),
        node: shard.node.clone(),
        timestamp: Utc::now(),
        result: json!({
            "status": "success",
            "synthetic": true,
            "servedBy": shard.model_name,
            "input": request,
        }),
    }
}

// ============================================================================
// SBIO: Router over the orchestrator's store
// ============================================================================

/// Spreads requests across a model's ready shards in strict rotation
///
/// Each model rotates independently, so traffic for one model never shifts
/// another model's position. The router only reads the store; it never
/// changes shard records.
#[derive(Debug, Default)]
pub struct InferenceRouter {
    balancers: DashMap<String, RoundRobinBalancer>,
}

impl InferenceRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one request to a ready shard whose name starts with `model`
    pub fn route_inference_request(
        &self,
        store: &DeploymentStore,
        model: &str,
        request: &Value,
    ) -> Result<InferenceRouteDecision, ShardError> {
        let ready = store.ready_with_prefix(model);

        let next = if ready.is_empty() {
            None
        } else {
            self.balancers
                .entry(model.to_string())
                .or_default()
                .next(ready.len())
        };

        let Some(index) = next else {
            warn!("No ready shards for model {}", model);
            return Err(ShardError::NoReadyShards(model.to_string()));
        };

        let shard = ready[index];
        let decision = build_decision(model, shard, request);
        debug!(
            "Routed request {} for {} to {} on {}",
            decision.request_id, model, decision.shard, decision.node
        );
        Ok(decision)
    }

    /// Drop the rotation position for `model`, e.g. after it is cleaned up
    pub fn forget(&self, model: &str) {
        self.balancers.remove(model);
    }

    /// Synthetic performance report over `window_secs`
    pub fn monitor_inference_performance(
        &self,
        store: &DeploymentStore,
        model: &str,
        window_secs: u64,
    ) -> PerformanceReport {
        let ready_shards = store.ready_with_prefix(model).len();
        PerformanceReport::synthesize(model, ready_shards, window_secs)
    }
}
