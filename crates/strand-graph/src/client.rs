//! The graph client contract every graph-engine driver provides.
//!
//! Connectors only ever talk to a backend through [`GraphClient`]: templated
//! queries with named variables, batched mutations, and predicate
//! declarations.

use std::collections::BTreeMap;

use async_trait::async_trait;

use strand_core::StrandError;

use crate::mutations::{MutationSet, SchemaUpdate};
use crate::tree::ResultNode;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Graph connection error: {0}")]
    Connection(String),

    #[error("Graph query error: {0}")]
    Query(String),

    #[error("Graph mutation error: {0}")]
    Mutation(String),

    #[error("Neo4j error: {0}")]
    Neo4j(#[from] neo4rs::Error),

    #[error("Schema source fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Node not found: {label} with id {id}")]
    NotFound { label: String, id: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<GraphError> for StrandError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Connection(msg) => StrandError::BackendUnavailable(msg),
            GraphError::Fetch(e) => StrandError::BackendUnavailable(e.to_string()),
            GraphError::NotFound { label, id } => StrandError::NotFound(format!("{label} {id}")),
            other => StrandError::Backend(other.to_string()),
        }
    }
}

/// Named query variables, e.g. `$uuid`. Values are always passed as strings
/// and typed by the query's variable declarations.
pub type Variables = BTreeMap<String, String>;

/// Uids the backend assigned to the blank nodes of a mutation, keyed by blank
/// node name.
pub type AssignedUids = BTreeMap<String, String>;

/// Build a [`Variables`] map from pairs.
pub fn vars(pairs: &[(&str, String)]) -> Variables {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Run a templated query; returns one node per match of each query block.
    async fn run_query(&self, query: &str, variables: &Variables)
        -> Result<Vec<ResultNode>, GraphError>;

    /// Submit a batch of edge writes and deletions as one request.
    async fn run_mutation(&self, mutation: &MutationSet) -> Result<AssignedUids, GraphError>;

    /// Declare a predicate with its value type and index directives.
    async fn define_schema(&self, update: &SchemaUpdate) -> Result<(), GraphError>;
}
