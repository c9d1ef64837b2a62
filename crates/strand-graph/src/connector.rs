//! The storage connector contract.
//!
//! A connector translates entity CRUD, meta analysis, and class migrations
//! into operations on one graph backend. Connectors hold no in-process lock
//! and no state beyond their client; every call takes an explicit
//! [`Context`].

use async_trait::async_trait;
use uuid::Uuid;

use strand_core::config::SchemaSources;
use strand_core::{
    Action, ActionGetResponse, ActionsListResponse, Class, Context, Kind, MetaProperty,
    MetaResult, Pagination, Property, Result, Schema, Thing, ThingGetResponse,
    ThingsListResponse,
};

#[async_trait]
pub trait StorageConnector: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Bootstrap the backend: merge the class documents from `sources` into
    /// `schema`, then make sure every class node and predicate exists.
    async fn init(&self, ctx: &Context, sources: &SchemaSources, schema: &mut Schema) -> Result<()>;

    // ── Things ────────────────────────────────────────────────────

    async fn add_thing(&self, ctx: &Context, thing: &Thing, uuid: Uuid) -> Result<()>;

    async fn get_thing(&self, ctx: &Context, uuid: Uuid) -> Result<ThingGetResponse>;

    async fn list_things(&self, ctx: &Context, page: Pagination) -> Result<ThingsListResponse>;

    async fn update_thing(&self, ctx: &Context, thing: &Thing, uuid: Uuid) -> Result<()>;

    async fn delete_thing(&self, ctx: &Context, uuid: Uuid) -> Result<()>;

    // ── Actions ───────────────────────────────────────────────────

    async fn add_action(&self, ctx: &Context, action: &Action, uuid: Uuid) -> Result<()>;

    async fn get_action(&self, ctx: &Context, uuid: Uuid) -> Result<ActionGetResponse>;

    /// Actions whose target is the given thing, newest first.
    async fn list_actions(
        &self,
        ctx: &Context,
        thing: Uuid,
        page: Pagination,
    ) -> Result<ActionsListResponse>;

    async fn update_action(&self, ctx: &Context, action: &Action, uuid: Uuid) -> Result<()>;

    async fn delete_action(&self, ctx: &Context, uuid: Uuid) -> Result<()>;

    // ── Meta ──────────────────────────────────────────────────────

    async fn get_meta(
        &self,
        ctx: &Context,
        kind: Kind,
        class: &Class,
        requests: &[MetaProperty],
    ) -> Result<MetaResult>;

    // ── Migrations ────────────────────────────────────────────────

    async fn create_class(&self, ctx: &Context, kind: Kind, class: &Class) -> Result<()>;

    /// Remove the class node and every instance of the class.
    async fn drop_class(&self, ctx: &Context, kind: Kind, class: &str) -> Result<()>;

    async fn add_property(
        &self,
        ctx: &Context,
        kind: Kind,
        class: &str,
        property: &Property,
    ) -> Result<()>;

    /// Remove the property's values from every instance of the class.
    async fn drop_property(&self, ctx: &Context, kind: Kind, class: &str, property: &str)
        -> Result<()>;
}
