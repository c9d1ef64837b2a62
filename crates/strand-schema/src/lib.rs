//! Strand Schema: the schema manager and its collaborators.
//!
//! [`SchemaManager`] owns the process-wide schema through a [`SchemaHandle`].
//! It authorizes every request, serializes mutations, persists through a
//! [`SchemaStore`] and applies the change to storage through a [`Migrator`].

pub mod auth;
pub mod lock;
pub mod manager;
pub mod migrator;
pub mod store;

pub use auth::{AdminListAuthorizer, Authorizer};
pub use lock::{SchemaHandle, SchemaLockGuard};
pub use manager::SchemaManager;
pub use migrator::{ConnectorMigrator, Migrator};
pub use store::{FileSchemaStore, SchemaStore};
