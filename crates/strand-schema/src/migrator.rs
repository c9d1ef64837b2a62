//! Applying schema changes to the storage backend.

use std::sync::Arc;

use async_trait::async_trait;

use strand_core::{Class, Context, Kind, Property, Result};
use strand_graph::StorageConnector;

#[async_trait]
pub trait Migrator: Send + Sync {
    async fn add_class(&self, ctx: &Context, kind: Kind, class: &Class) -> Result<()>;

    async fn drop_class(&self, ctx: &Context, kind: Kind, class: &str) -> Result<()>;

    async fn add_property(&self, ctx: &Context, kind: Kind, class: &str, property: &Property)
        -> Result<()>;

    async fn drop_property(&self, ctx: &Context, kind: Kind, class: &str, property: &str)
        -> Result<()>;
}

/// Migrates through a storage connector's migration hooks.
pub struct ConnectorMigrator {
    connector: Arc<dyn StorageConnector>,
}

impl ConnectorMigrator {
    pub fn new(connector: Arc<dyn StorageConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl Migrator for ConnectorMigrator {
    async fn add_class(&self, ctx: &Context, kind: Kind, class: &Class) -> Result<()> {
        self.connector.create_class(ctx, kind, class).await
    }

    async fn drop_class(&self, ctx: &Context, kind: Kind, class: &str) -> Result<()> {
        self.connector.drop_class(ctx, kind, class).await
    }

    async fn add_property(
        &self,
        ctx: &Context,
        kind: Kind,
        class: &str,
        property: &Property,
    ) -> Result<()> {
        self.connector.add_property(ctx, kind, class, property).await
    }

    async fn drop_property(&self, ctx: &Context, kind: Kind, class: &str, property: &str) -> Result<()> {
        self.connector.drop_property(ctx, kind, class, property).await
    }
}
