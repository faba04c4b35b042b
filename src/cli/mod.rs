//! CLI module for shardnet
//!
//! Provides kubectl-like subcommands:
//! - `shardnet serve` - Run the shard API server
//! - `shardnet nodes` - Inspect and manage worker nodes (direct to the cluster)
//! - `shardnet deploy|status|infer|metrics|cleanup` - Sharded models (via the shard API)
//! - `shardnet context` - Manage cluster contexts
//! - `shardnet demo` - Run a deploy/route cycle against a simulated cluster

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;

pub use commands::*;
pub use display::*;

use crate::metrics::DEFAULT_WINDOW_SECS;
use crate::sharding::strategy::DEFAULT_NUM_SHARDS;

#[derive(Parser, Debug)]
#[command(name = "shardnet")]
#[command(about = "Manage cluster worker nodes and deploy sharded models across them")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: ~/.shardnet/config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a .env file to load before running
    #[arg(long, value_name = "FILE", global = true)]
    pub env_file: Option<PathBuf>,

    /// Bearer token for the cluster API, overrides the context's token
    #[arg(long, env = "SHARDNET_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Shard API URL (default: derived from the local config)
    #[arg(long, global = true)]
    pub api: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the shard API server against the current context's cluster
    Serve(ServeArgs),

    /// Inspect and manage cluster nodes
    #[command(visible_alias = "node", visible_alias = "no")]
    Nodes(NodesArgs),

    /// Deploy a model as shards across worker nodes
    Deploy(DeployArgs),

    /// Show shard deployment status
    Status {
        /// Only shards of this model
        model: Option<String>,
    },

    /// Route an inference request to a ready shard
    Infer {
        /// Model name
        model: String,

        /// Request payload as JSON
        #[arg(short, long, default_value = "{}")]
        data: String,
    },

    /// Show synthetic performance figures for a model
    Metrics {
        /// Model name
        model: String,

        /// Window in seconds
        #[arg(short, long, default_value_t = DEFAULT_WINDOW_SECS)]
        window: u64,
    },

    /// Delete every deployment of a model
    Cleanup {
        /// Model name
        model: String,
    },

    /// Manage cluster contexts
    Context(ContextArgs),

    /// Deploy, route and clean up against a simulated cluster
    Demo(DemoArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Bind address (default: from config, 0.0.0.0)
    #[arg(long)]
    pub bind_addr: Option<String>,

    /// Port to listen on (default: from config, 8282)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve against a simulated cluster instead of the current context
    #[arg(long)]
    pub simulated: bool,
}

/// Arguments for the nodes command
#[derive(Parser, Debug)]
pub struct NodesArgs {
    #[command(subcommand)]
    pub action: NodesAction,
}

#[derive(Subcommand, Debug)]
pub enum NodesAction {
    /// List all nodes
    #[command(visible_alias = "ls")]
    List,

    /// List ready, schedulable worker nodes
    Available,

    /// Set labels on a node
    Label {
        /// Node name
        name: String,

        /// Labels as KEY=VALUE
        #[arg(required = true)]
        labels: Vec<String>,
    },

    /// Mark a node unschedulable
    Cordon {
        /// Node name
        name: String,
    },

    /// Mark a node schedulable
    Uncordon {
        /// Node name
        name: String,
    },

    /// Evict all pods from a node, then cordon it
    Drain {
        /// Node name
        name: String,
    },

    /// Report nodes that are not ready
    Monitor,
}

/// Arguments for the deploy command
#[derive(Parser, Debug)]
pub struct DeployArgs {
    /// Model name
    pub model: String,

    /// Model version
    #[arg(long, default_value = "v1")]
    pub version: String,

    /// Container image serving the model
    #[arg(long)]
    pub image: String,

    /// Number of shards
    #[arg(short, long, default_value_t = DEFAULT_NUM_SHARDS)]
    pub shards: usize,
}

/// Arguments for the context command
#[derive(Parser, Debug)]
pub struct ContextArgs {
    #[command(subcommand)]
    pub action: ContextAction,
}

#[derive(Subcommand, Debug)]
pub enum ContextAction {
    /// List all contexts
    List,

    /// Show current context
    Current,

    /// Switch to a context
    Use {
        /// Context name
        name: String,
    },

    /// Add a new context
    Add {
        /// Context name
        name: String,

        /// Cluster API server URL
        #[arg(long)]
        server: String,

        /// Bearer token
        #[arg(long)]
        token: Option<String>,

        /// File holding the bearer token
        #[arg(long)]
        token_file: Option<String>,

        /// Namespace for shard deployments
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Description
        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a context
    Delete {
        /// Context name
        name: String,
    },
}

/// Arguments for the demo command
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Model name
    #[arg(long, default_value = "demo-model")]
    pub model: String,

    /// Simulated worker nodes
    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    /// Shards to deploy
    #[arg(short, long, default_value_t = 2)]
    pub shards: usize,

    /// Inference requests to route
    #[arg(short, long, default_value_t = 4)]
    pub requests: usize,
}
