//! Strand Graph: storage connectors for the graph backends.
//!
//! Every entity read and write flows through a [`StorageConnector`]. The
//! result-tree connector ([`DgraphConnector`]) talks to its engine only
//! through the [`GraphClient`] facade; the Neo4j connector speaks Cypher
//! through neo4rs.

pub mod bootstrap;
pub mod client;
pub mod connector;
pub mod decode;
pub mod dgraph;
pub mod meta;
pub mod mutations;
pub mod neo4j;
pub mod queries;
pub mod tree;

pub use client::{vars, AssignedUids, GraphClient, GraphError, Variables};
pub use connector::StorageConnector;
pub use dgraph::DgraphConnector;
pub use meta::build_meta_query;
pub use mutations::{Deletion, Edge, MutationSet, NodeRef, Object, SchemaUpdate, ValueType};
pub use neo4j::{Neo4jClient, Neo4jConnector};
pub use tree::{Prop, ResultNode, Value};
