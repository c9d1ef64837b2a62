//! Configuration management for Strand services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (STRAND__ prefix, `__` separated)
//! 2. Config file (strand.toml)
//! 3. Defaults

use serde::Deserialize;

use crate::error::{Result, StrandError};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StrandConfig {
    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub admin_list: AdminListConfig,

    /// Per-request deadline applied by the CLI, in seconds. 0 disables it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Connection settings for the graph backend.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

/// Where the schema is persisted and where bootstrap class documents live.
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    /// Path of the persisted schema document.
    #[serde(default = "default_schema_path")]
    pub path: String,

    #[serde(default)]
    pub sources: SchemaSources,
}

/// Bootstrap class documents, one per kind. Each entry is a URL or a local
/// path; an empty entry is skipped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaSources {
    #[serde(default)]
    pub things: String,
    #[serde(default)]
    pub actions: String,
}

/// Admin list authorization: subjects on `users` may do everything, subjects
/// on `read_only_users` may only read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminListConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub read_only_users: Vec<String>,
}

impl AdminListConfig {
    /// Reject subjects that appear on both lists.
    pub fn validate(&self) -> Result<()> {
        for user in &self.users {
            if self.read_only_users.contains(user) {
                return Err(StrandError::Config(format!(
                    "admin list: subject '{user}' is present on both admin and read-only list"
                )));
            }
        }
        Ok(())
    }
}

impl StrandConfig {
    /// Load configuration from `<file_prefix>.toml` (optional) and `STRAND__*`
    /// environment variables.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("STRAND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| StrandError::Config(e.to_string()))?;

        let loaded: StrandConfig = cfg
            .try_deserialize()
            .map_err(|e| StrandError::Config(e.to_string()))?;
        loaded.admin_list.validate()?;

        tracing::debug!(uri = %loaded.graph.uri, schema_path = %loaded.schema.path, "Configuration loaded");
        Ok(loaded)
    }
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "strand-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_schema_path() -> String {
    "./schema.json".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for StrandConfig {
    fn default() -> Self {
        Self {
            graph: GraphConfig::default(),
            schema: SchemaConfig::default(),
            admin_list: AdminListConfig::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: default_schema_path(),
            sources: SchemaSources::default(),
        }
    }
}
