//! Command implementations for the CLI
//!
//! SBIO pattern: Commands return Results, I/O is handled by caller

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::DemoArgs;
use crate::cluster::{LifecycleError, Node};
use crate::context::{self, Config, Context, ContextError};
use crate::gateway::{GatewayError, HttpGateway, InMemoryGateway};
use crate::metrics::PerformanceReport;
use crate::server::{DeployRequest, DeployResponse, OperationStatus, ResourceList};
use crate::sharding::{
    InferenceRouteDecision, OrchestratorConfig, PartitionSharding, ShardDeployment, ShardError,
    ShardingOptions, ShardingStrategy,
};

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Cluster error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("{0}")]
    Shard(#[from] ShardError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for commands
pub type CommandResult<T> = Result<T, CommandError>;

// ============================================================================
// Context Commands (Pure business logic)
// ============================================================================

/// Info about a context for display
#[derive(Debug, Clone)]
pub struct ContextInfo {
    pub name: String,
    pub server: String,
    pub namespace: String,
    pub is_current: bool,
}

/// List all contexts, including the built-in `local` unless overridden
pub fn context_list(config: &Config) -> Vec<ContextInfo> {
    let current = config.current_name();
    let mut contexts: Vec<_> = config
        .contexts
        .values()
        .map(|ctx| ContextInfo {
            name: ctx.name.clone(),
            server: ctx.server.clone(),
            namespace: ctx.namespace.clone(),
            is_current: ctx.name == current,
        })
        .collect();

    if !config.contexts.contains_key(context::LOCAL_CONTEXT) {
        let local = Context::local();
        contexts.push(ContextInfo {
            is_current: current == local.name,
            name: local.name,
            server: local.server,
            namespace: local.namespace,
        });
    }

    contexts.sort_by(|a, b| a.name.cmp(&b.name));
    contexts
}

/// Get current context name and server URL
pub fn context_current(config: &Config) -> CommandResult<(String, String)> {
    let ctx = config.resolve_context()?;
    Ok((ctx.name, ctx.server))
}

/// Switch to a context
pub fn context_use(config: &mut Config, name: &str) -> CommandResult<()> {
    context::set_current_context(config, name)?;
    Ok(())
}

/// Add a new context
pub fn context_add(config: &mut Config, ctx: Context) -> CommandResult<()> {
    if ctx.token.is_some() && ctx.token_file.is_some() {
        return Err(CommandError::InvalidArgument(
            "use either a token or a token file, not both".to_string(),
        ));
    }
    context::add_context(config, ctx);
    Ok(())
}

/// Delete a context
pub fn context_delete(config: &mut Config, name: &str) -> CommandResult<bool> {
    Ok(context::remove_context(config, name).is_some())
}

// ============================================================================
// Argument parsing helpers
// ============================================================================

/// Parse `KEY=VALUE` pairs
pub fn parse_labels(pairs: &[String]) -> CommandResult<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(CommandError::InvalidArgument(format!(
                "label '{}' is not KEY=VALUE",
                pair
            ))),
        })
        .collect()
}

/// Parse an inference payload
pub fn parse_request_data(data: &str) -> CommandResult<Value> {
    Ok(serde_json::from_str(data)?)
}

// ============================================================================
// Cluster access
// ============================================================================

/// Gateway for the current context; `token` overrides the context's token
pub fn gateway_from_config(
    config: &Config,
    token: Option<&str>,
) -> CommandResult<(HttpGateway, Context)> {
    let ctx = config.resolve_context()?;
    let token = match token {
        Some(t) => Some(t.to_string()),
        None => ctx.resolve_token()?,
    };
    debug!("Using context {} ({})", ctx.name, ctx.server);
    let gateway = HttpGateway::new(ctx.server.clone(), token)?;
    Ok((gateway, ctx))
}

/// Display label for a node's state
pub fn node_status(node: &Node) -> &'static str {
    match (node.is_ready(), node.schedulable) {
        (true, true) => "Ready",
        (true, false) => "Ready,SchedulingDisabled",
        (false, true) => "NotReady",
        (false, false) => "NotReady,SchedulingDisabled",
    }
}

// ============================================================================
// Demo (simulated cluster)
// ============================================================================

/// What the demo did, for display
#[derive(Debug, Clone)]
pub struct DemoSummary {
    pub available: Vec<String>,
    pub deployed: DeployResponse,
    pub statuses: Vec<ShardDeployment>,
    pub routes: Vec<InferenceRouteDecision>,
    pub report: PerformanceReport,
    pub deleted: usize,
}

/// Simulated cluster: `workers` ready workers plus one cordoned worker and
/// one control-plane node
pub fn demo_cluster(workers: usize) -> InMemoryGateway {
    let mut nodes: Vec<Node> = (1..=workers)
        .map(|i| Node::new(format!("worker-{}", i)).worker().ready(true))
        .collect();
    nodes.push(Node::new("worker-cordoned").worker().ready(true).cordon());
    nodes.push(Node::new("control-plane").ready(true));
    InMemoryGateway::with_nodes(nodes)
}

/// Deploy, reconcile, route, report and clean up on a simulated cluster
pub async fn run_demo(args: &DemoArgs) -> CommandResult<DemoSummary> {
    let gateway = Arc::new(demo_cluster(args.workers));
    let registry = crate::cluster::NodeRegistry::new(gateway.clone());
    let available = registry.list_available_worker_nodes().await?;

    let mut strategy = PartitionSharding::new(gateway.clone(), OrchestratorConfig::default());
    let outcome = strategy
        .deploy(
            &args.model,
            "v1",
            "registry.local/demo-model:latest",
            ShardingOptions::with_shards(args.shards),
        )
        .await?;

    // The simulated cluster rolls everything out at once
    gateway.mark_all_ready();
    let statuses = strategy.status(Some(&args.model)).await;

    let mut routes = Vec::with_capacity(args.requests);
    for i in 0..args.requests {
        let request = serde_json::json!({ "input": format!("request-{}", i) });
        routes.push(strategy.route(&args.model, &request).await?);
    }

    let report = strategy.monitor_performance(&args.model, 60).await;
    let deleted = strategy.cleanup(&args.model).await?;

    Ok(DemoSummary {
        available,
        deployed: DeployResponse {
            model: args.model.clone(),
            strategy: strategy.name().to_string(),
            shards: outcome.shards,
            failed: outcome.failed,
        },
        statuses,
        routes,
        report,
        deleted,
    })
}

// ============================================================================
// HTTP Client for the shard API
// ============================================================================

/// Client for communicating with a shard API server
pub struct ShardApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ShardApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Client for `api`, or the local server from the config
    pub fn from_config(config: &Config, api: Option<&str>) -> Self {
        match api {
            Some(url) => Self::new(url),
            None => Self::new(config.api_url()),
        }
    }

    fn build_request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url)
    }

    async fn parse<T: DeserializeOwned>(resp: reqwest::Response) -> CommandResult<T> {
        let status = resp.status();
        let body: Value = resp.json().await?;

        if !status.is_success() {
            let error = body["error"].as_str().unwrap_or("Unknown error");
            return Err(CommandError::Server(format!("{} ({})", error, status)));
        }
        Ok(serde_json::from_value(body)?)
    }

    /// Deploy a sharded model
    pub async fn deploy(&self, request: &DeployRequest) -> CommandResult<DeployResponse> {
        let resp = self
            .build_request(reqwest::Method::POST, "/v1/models")
            .json(request)
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// Refresh and list shard deployments
    pub async fn status(&self, model: Option<&str>) -> CommandResult<Vec<ShardDeployment>> {
        let mut req = self.build_request(reqwest::Method::GET, "/v1/models/status");
        if let Some(model) = model {
            req = req.query(&[("model", model)]);
        }
        let list: ResourceList<ShardDeployment> = Self::parse(req.send().await?).await?;
        Ok(list.items)
    }

    /// Route one inference request
    pub async fn infer(&self, model: &str, request: &Value) -> CommandResult<InferenceRouteDecision> {
        let resp = self
            .build_request(reqwest::Method::POST, &format!("/v1/models/{}/infer", model))
            .json(request)
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// Synthetic performance report
    pub async fn metrics(&self, model: &str, window_secs: u64) -> CommandResult<PerformanceReport> {
        let resp = self
            .build_request(reqwest::Method::GET, &format!("/v1/models/{}/metrics", model))
            .query(&[("window", window_secs)])
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// Delete every deployment of a model
    pub async fn cleanup(&self, model: &str) -> CommandResult<OperationStatus> {
        let resp = self
            .build_request(reqwest::Method::DELETE, &format!("/v1/models/{}", model))
            .send()
            .await?;
        Self::parse(resp).await
    }

    /// Deploy request body from CLI arguments
    pub fn deploy_request(model: &str, version: &str, image: &str, shards: usize) -> DeployRequest {
        DeployRequest {
            model: model.to_string(),
            version: version.to_string(),
            image: image.to_string(),
            options: ShardingOptions::with_shards(shards),
        }
    }
}
