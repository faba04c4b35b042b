use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sharding::OrchestratorConfig;

/// Default port for the shard API server
pub const DEFAULT_API_PORT: u16 = 8282;

/// Cluster API of the built-in `local` context (`kubectl proxy`)
pub const LOCAL_CLUSTER_SERVER: &str = "http://127.0.0.1:8001";

/// Name of the built-in context
pub const LOCAL_CONTEXT: &str = "local";

/// Default config file location: ~/.shardnet/config
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".shardnet")
        .join("config")
}

/// Errors that can occur during context operations
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Context '{0}' not found")]
    ContextNotFound(String),

    #[error("No current context set")]
    NoCurrentContext,

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Failed to write config: {0}")]
    WriteError(String),

    #[error("Failed to read token file {0}: {1}")]
    TokenFile(String, String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn default_namespace() -> String {
    "default".to_string()
}

/// A cluster control plane the CLI and server can talk to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Display name for this context
    pub name: String,
    /// Cluster API URL (e.g. "https://10.0.0.1:6443")
    pub server: String,
    /// Bearer token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// File holding the bearer token, `~` is expanded
    #[serde(rename = "token-file", skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    /// Namespace shard deployments live in
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The complete configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Currently active context name
    #[serde(rename = "current-context")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,

    /// Map of context name to context definition
    #[serde(default)]
    pub contexts: HashMap<String, Context>,

    /// Local shard API server settings
    #[serde(default)]
    pub local: LocalConfig,
}

/// Local shard API server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_addr: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_API_PORT,
            bind_addr: default_bind_address(),
        }
    }
}

fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse config from YAML string
pub fn parse_config(content: &str) -> Result<Config, ContextError> {
    serde_yaml::from_str(content).map_err(|e| ContextError::ParseError(e.to_string()))
}

/// Serialize config to YAML string
pub fn serialize_config(config: &Config) -> Result<String, ContextError> {
    serde_yaml::to_string(config).map_err(|e| ContextError::WriteError(e.to_string()))
}

/// Add or update a context in the config
pub fn add_context(config: &mut Config, context: Context) {
    config.contexts.insert(context.name.clone(), context);
}

/// Remove a context from the config
pub fn remove_context(config: &mut Config, name: &str) -> Option<Context> {
    let removed = config.contexts.remove(name);
    if config.current_context.as_deref() == Some(name) {
        config.current_context = None;
    }
    removed
}

/// Set the current context
pub fn set_current_context(config: &mut Config, name: &str) -> Result<(), ContextError> {
    if !config.contexts.contains_key(name) && name != LOCAL_CONTEXT {
        return Err(ContextError::ContextNotFound(name.to_string()));
    }
    config.current_context = Some(name.to_string());
    Ok(())
}

/// Get the current context name
pub fn get_current_context(config: &Config) -> Result<&str, ContextError> {
    config
        .current_context
        .as_deref()
        .ok_or(ContextError::NoCurrentContext)
}

/// List all context names, sorted
pub fn list_contexts(config: &Config) -> Vec<&str> {
    let mut names: Vec<&str> = config.contexts.keys().map(|s| s.as_str()).collect();
    names.sort_unstable();
    names
}

// ============================================================================
// I/O boundary functions
// ============================================================================

/// Load config from the default location
pub fn load_config() -> Result<Config, ContextError> {
    load_config_from(&default_config_path())
}

/// Load config from a specific path, defaulting when the file is missing
pub fn load_config_from(path: &Path) -> Result<Config, ContextError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Save config to the default location
pub fn save_config(config: &Config) -> Result<(), ContextError> {
    save_config_to(config, &default_config_path())
}

/// Save config to a specific path
pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ContextError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serialize_config(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

impl Config {
    /// Name of the active context, `local` when none is set
    pub fn current_name(&self) -> &str {
        self.current_context.as_deref().unwrap_or(LOCAL_CONTEXT)
    }

    /// Resolve the active context
    ///
    /// A user-defined context named `local` takes precedence over the
    /// built-in one.
    pub fn resolve_context(&self) -> Result<Context, ContextError> {
        let name = self.current_name();
        match self.contexts.get(name) {
            Some(ctx) => Ok(ctx.clone()),
            None if name == LOCAL_CONTEXT => Ok(Context::local()),
            None => Err(ContextError::ContextNotFound(name.to_string())),
        }
    }

    /// URL clients use to reach the local shard API
    pub fn api_url(&self) -> String {
        let host = match self.local.bind_addr.as_str() {
            "0.0.0.0" => "127.0.0.1",
            other => other,
        };
        format!("http://{}:{}", host, self.local.port)
    }

    /// Address the shard API server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.local.bind_addr, self.local.port)
    }
}

impl Context {
    /// Create a new context in the `default` namespace
    pub fn new(name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            token: None,
            token_file: None,
            namespace: default_namespace(),
            description: None,
        }
    }

    /// The built-in context, a `kubectl proxy` on localhost
    pub fn local() -> Self {
        Self::new(LOCAL_CONTEXT, LOCAL_CLUSTER_SERVER)
            .with_description("kubectl proxy on localhost")
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_token_file(mut self, path: impl Into<String>) -> Self {
        self.token_file = Some(path.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Bearer token: the inline token, else the trimmed token file contents
    pub fn resolve_token(&self) -> Result<Option<String>, ContextError> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }
        let Some(file) = &self.token_file else {
            return Ok(None);
        };

        let path = shellexpand::tilde(file);
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ContextError::TokenFile(path.to_string(), e.to_string()))?;
        Ok(Some(content.trim().to_string()))
    }

    /// Orchestrator settings for deployments made through this context
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            namespace: self.namespace.clone(),
            ..OrchestratorConfig::default()
        }
    }
}
