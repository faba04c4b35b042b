use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::warn;

use super::state::ShardApiState;
use crate::cluster::{DrainReport, LifecycleError, Node};
use crate::gateway::GatewayError;
use crate::metrics::DEFAULT_WINDOW_SECS;
use crate::sharding::{InferenceRouteDecision, ShardDeployment, ShardError, ShardingOptions};

/// Create the shard API router
pub fn create_router(state: ShardApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        // Nodes
        .route("/v1/nodes", get(list_nodes))
        .route("/v1/nodes/available", get(available_nodes))
        .route("/v1/nodes/health", get(node_health))
        .route("/v1/nodes/{name}/labels", post(label_node))
        .route("/v1/nodes/{name}/cordon", post(cordon_node))
        .route("/v1/nodes/{name}/uncordon", post(uncordon_node))
        .route("/v1/nodes/{name}/drain", post(drain_node))
        // Models
        .route("/v1/models", post(deploy_model))
        .route("/v1/models/status", get(model_status))
        .route("/v1/models/{model}/infer", post(infer))
        .route("/v1/models/{model}/metrics", get(model_metrics))
        .route("/v1/models/{model}", delete(cleanup_model))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

// ============================================================================
// Responses & errors
// ============================================================================

/// Response for listing resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceList<T> {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Kind (e.g., "NodeList", "ShardDeploymentList")
    pub kind: String,

    pub items: Vec<T>,
}

impl<T> ResourceList<T> {
    pub fn new(kind: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            api_version: "shardnet/v1".to_string(),
            kind: kind.into(),
            items,
        }
    }
}

/// Error body returned by every failing endpoint
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(e: GatewayError) -> Self {
        let status = match e {
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, e.to_string())
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Gateway(inner) => inner.into(),
            partial => Self::new(StatusCode::INTERNAL_SERVER_ERROR, partial.to_string()),
        }
    }
}

impl From<ShardError> for ApiError {
    fn from(e: ShardError) -> Self {
        let status = match &e {
            ShardError::Gateway(GatewayError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ShardError::Gateway(_) | ShardError::Deployment { .. } => StatusCode::BAD_GATEWAY,
            ShardError::InsufficientCapacity { .. } => StatusCode::CONFLICT,
            ShardError::NoReadyShards(_) => StatusCode::SERVICE_UNAVAILABLE,
            ShardError::PartialFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Health
// ============================================================================

async fn health() -> impl IntoResponse {
    StatusCode::OK
}

// ============================================================================
// Node Endpoints
// ============================================================================

async fn list_nodes(State(state): State<ShardApiState>) -> ApiResult<Json<ResourceList<Node>>> {
    let nodes = state.registry.list_nodes().await?;
    Ok(Json(ResourceList::new("NodeList", nodes)))
}

async fn available_nodes(
    State(state): State<ShardApiState>,
) -> ApiResult<Json<ResourceList<String>>> {
    let names = state.registry.list_available_worker_nodes().await?;
    Ok(Json(ResourceList::new("AvailableWorkerList", names)))
}

/// Nodes without a true Ready condition
#[derive(Debug, Serialize, Deserialize)]
pub struct NodeHealth {
    pub healthy: bool,
    #[serde(rename = "notReady")]
    pub not_ready: Vec<String>,
}

async fn node_health(State(state): State<ShardApiState>) -> ApiResult<Json<NodeHealth>> {
    let not_ready = state.lifecycle.monitor_nodes().await?;
    Ok(Json(NodeHealth {
        healthy: not_ready.is_empty(),
        not_ready,
    }))
}

/// Result of a mutating operation
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationStatus {
    pub success: bool,
    pub message: String,
}

impl OperationStatus {
    fn ok(message: String) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

async fn label_node(
    State(state): State<ShardApiState>,
    Path(name): Path<String>,
    Json(labels): Json<HashMap<String, String>>,
) -> ApiResult<Json<OperationStatus>> {
    let count = labels.len();
    state.lifecycle.label_node(&name, labels).await?;
    Ok(OperationStatus::ok(format!(
        "node/{} labeled ({} label(s))",
        name, count
    )))
}

async fn cordon_node(
    State(state): State<ShardApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<OperationStatus>> {
    state.lifecycle.cordon_node(&name).await?;
    Ok(OperationStatus::ok(format!("node/{} cordoned", name)))
}

async fn uncordon_node(
    State(state): State<ShardApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<OperationStatus>> {
    state.lifecycle.uncordon_node(&name).await?;
    Ok(OperationStatus::ok(format!("node/{} uncordoned", name)))
}

/// Drain outcome
#[derive(Debug, Serialize, Deserialize)]
pub struct DrainResponse {
    pub node: String,
    pub evicted: Vec<String>,
    pub skipped: Vec<String>,
}

impl From<DrainReport> for DrainResponse {
    fn from(report: DrainReport) -> Self {
        Self {
            node: report.node,
            evicted: report.evicted,
            skipped: report.skipped,
        }
    }
}

async fn drain_node(
    State(state): State<ShardApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<DrainResponse>> {
    let report = state.lifecycle.drain_node(&name).await?;
    Ok(Json(report.into()))
}

// ============================================================================
// Model Endpoints
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployRequest {
    pub model: String,
    pub version: String,
    pub image: String,
    #[serde(flatten)]
    pub options: ShardingOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub model: String,
    pub strategy: String,
    /// Shard name -> node
    pub shards: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

/// 201 when every shard deployed, 207 when some failed
async fn deploy_model(
    State(state): State<ShardApiState>,
    Json(request): Json<DeployRequest>,
) -> ApiResult<(StatusCode, Json<DeployResponse>)> {
    let mut strategy = state.strategy.lock().await;
    let outcome = strategy
        .deploy(
            &request.model,
            &request.version,
            &request.image,
            request.options,
        )
        .await?;

    let status = if outcome.is_partial() {
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::CREATED
    };

    Ok((
        status,
        Json(DeployResponse {
            model: request.model,
            strategy: strategy.name().to_string(),
            shards: outcome.shards,
            failed: outcome.failed,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    model: Option<String>,
}

async fn model_status(
    State(state): State<ShardApiState>,
    Query(query): Query<StatusQuery>,
) -> Json<ResourceList<ShardDeployment>> {
    let records = state
        .strategy
        .lock()
        .await
        .status(query.model.as_deref())
        .await;
    Json(ResourceList::new("ShardDeploymentList", records))
}

async fn infer(
    State(state): State<ShardApiState>,
    Path(model): Path<String>,
    Json(request): Json<Value>,
) -> ApiResult<Json<InferenceRouteDecision>> {
    let decision = state.strategy.lock().await.route(&model, &request).await?;
    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
struct MetricsQuery {
    window: Option<u64>,
}

async fn model_metrics(
    State(state): State<ShardApiState>,
    Path(model): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> impl IntoResponse {
    let window = query.window.unwrap_or(DEFAULT_WINDOW_SECS);
    let report = state
        .strategy
        .lock()
        .await
        .monitor_performance(&model, window)
        .await;
    Json(report)
}

async fn cleanup_model(
    State(state): State<ShardApiState>,
    Path(model): Path<String>,
) -> ApiResult<Json<OperationStatus>> {
    let deleted = state
        .strategy
        .lock()
        .await
        .cleanup(&model)
        .await
        .inspect_err(|e| warn!("Cleanup of {} failed: {}", model, e))?;

    Ok(OperationStatus::ok(format!(
        "model/{} cleaned up ({} deployment(s) deleted)",
        model, deleted
    )))
}
