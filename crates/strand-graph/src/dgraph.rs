//! Storage connector for result-tree graph engines.
//!
//! Every entity is stored as an identity node with a `type` edge to its
//! class node and an `id` edge to a UUID anchor node carrying the `uuid`
//! string. Writes resolve every node they depend on first and then submit a
//! single mutation, so a failed lookup leaves the backend untouched.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use strand_core::config::SchemaSources;
use strand_core::{
    Action, ActionGetResponse, ActionsListResponse, Class, Context, DataType, Kind, MetaProperty,
    MetaResult, Pagination, Property, PropertyMap, PropertyValue, Result, ScalarValue, Schema,
    StrandError, Thing, ThingGetResponse, ThingsListResponse,
};

use crate::bootstrap;
use crate::client::{vars, GraphClient, GraphError, Variables};
use crate::connector::StorageConnector;
use crate::decode::{decode_entity, decode_entity_node, DecodedEntity};
use crate::meta::{build_meta_query, decode_meta};
use crate::mutations::{MutationSet, NodeRef, SchemaUpdate, ValueType};
use crate::queries::{self, predicates as p};
use crate::tree::{ResultNode, Value};

/// Uids behind one UUID, resolved for the duration of a single request.
#[derive(Debug, Clone)]
struct UuidNode {
    anchor: String,
    identity: Option<String>,
    /// Entities with an `action.of` edge into the identity node.
    subjects: Vec<String>,
}

/// The backend-facing fields of a thing or action.
struct EntityWrite<'a> {
    class: NodeRef,
    context: &'a str,
    schema: &'a PropertyMap,
    refs: Vec<(String, String)>,
    timestamps: Vec<(&'static str, i64)>,
    /// Target and subject identity uids of an action.
    action: Option<(String, String)>,
}

pub struct DgraphConnector<C> {
    client: C,
}

impl<C: GraphClient> DgraphConnector<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn query(&self, ctx: &Context, query: &str, variables: &Variables) -> Result<Vec<ResultNode>> {
        ctx.run(self.client.run_query(query, variables)).await
    }

    async fn mutate(&self, ctx: &Context, mutation: &MutationSet) -> Result<BTreeMap<String, String>> {
        ctx.run(self.client.run_mutation(mutation)).await
    }

    async fn class_uid(&self, ctx: &Context, key: &str) -> Result<Option<String>> {
        let nodes = self
            .query(ctx, queries::CLASS_BY_KEY, &vars(&[("class", key.to_string())]))
            .await?;
        Ok(nodes.iter().find_map(|n| n.uid().map(str::to_string)))
    }

    async fn lookup_uuid(&self, ctx: &Context, uuid: Uuid) -> Result<Option<UuidNode>> {
        let nodes = self
            .query(ctx, queries::NODE_BY_UUID, &vars(&[("uuid", uuid.to_string())]))
            .await?;
        let Some(node) = nodes.first() else {
            return Ok(None);
        };
        let anchor = node
            .uid()
            .ok_or_else(|| GraphError::Query(format!("uuid anchor of {uuid} returned without uid")))?
            .to_string();

        let identity = node.child(p::REVERSE_ID);
        Ok(Some(UuidNode {
            anchor,
            identity: identity.and_then(|i| i.uid()).map(str::to_string),
            subjects: identity
                .map(|i| {
                    i.children_labeled(p::REVERSE_ACTION_OF)
                        .filter_map(|s| s.uid().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
        }))
    }

    /// Identity uid of an existing entity, `NotFound` otherwise.
    async fn identity_of(&self, ctx: &Context, uuid: Uuid, what: &str) -> Result<String> {
        self.lookup_uuid(ctx, uuid)
            .await?
            .and_then(|n| n.identity)
            .ok_or_else(|| StrandError::NotFound(format!("{what} {uuid}")))
    }

    async fn resolve_refs(&self, ctx: &Context, schema: &PropertyMap) -> Result<Vec<(String, String)>> {
        let mut refs = Vec::new();
        for (name, value) in schema {
            if let PropertyValue::Ref(id) = value {
                let uid = self
                    .identity_of(ctx, *id, &format!("entity referenced by '{name}'"))
                    .await?;
                refs.push((name.clone(), uid));
            }
        }
        Ok(refs)
    }

    /// The class node to attach to, creating it in `m` if it does not exist.
    async fn class_node(&self, ctx: &Context, kind: Kind, class: &str, m: &mut MutationSet) -> Result<NodeRef> {
        let key = kind.class_key(class);
        match self.class_uid(ctx, &key).await? {
            Some(uid) => Ok(NodeRef::uid(uid)),
            None => {
                let node = NodeRef::blank("class");
                m.set_value(&node, p::CLASS, Value::Str(key));
                Ok(node)
            }
        }
    }

    async fn prepare_thing<'a>(
        &self,
        ctx: &Context,
        thing: &'a Thing,
        m: &mut MutationSet,
    ) -> Result<EntityWrite<'a>> {
        let class = self.class_node(ctx, Kind::Thing, &thing.class, m).await?;
        let refs = self.resolve_refs(ctx, &thing.schema).await?;
        Ok(EntityWrite {
            class,
            context: &thing.context,
            schema: &thing.schema,
            refs,
            timestamps: vec![
                (p::CREATION_TIME_MS, thing.creation_time_ms),
                (p::LAST_SEEN_TIME_MS, thing.last_seen_time_ms),
                (p::LAST_UPDATE_TIME_MS, thing.last_update_time_ms),
                (p::LAST_USE_TIME_MS, thing.last_use_time_ms),
            ],
            action: None,
        })
    }

    async fn prepare_action<'a>(
        &self,
        ctx: &Context,
        action: &'a Action,
        m: &mut MutationSet,
    ) -> Result<EntityWrite<'a>> {
        let class = self.class_node(ctx, Kind::Action, &action.class, m).await?;
        let refs = self.resolve_refs(ctx, &action.schema).await?;
        let target = self.identity_of(ctx, action.thing_id, "action target").await?;
        let subject = self.identity_of(ctx, action.subject_id, "action subject").await?;
        Ok(EntityWrite {
            class,
            context: &action.context,
            schema: &action.schema,
            refs,
            timestamps: vec![
                (p::CREATION_TIME_UNIX, action.creation_time_unix),
                (p::LAST_UPDATE_TIME_UNIX, action.last_update_time_unix),
            ],
            action: Some((target, subject)),
        })
    }

    async fn add_entity(&self, ctx: &Context, kind: Kind, uuid: Uuid, write: EntityWrite<'_>, mut m: MutationSet) -> Result<()> {
        let entity = NodeRef::blank("entity");
        let anchor = NodeRef::blank("uuid");
        m.connect(&entity, p::ID, &anchor);
        m.set_value(&anchor, p::UUID, Value::Str(uuid.to_string()));
        write_entity(&mut m, &entity, &write, false);

        self.mutate(ctx, &m).await?;
        debug!(kind = %kind, %uuid, edges = m.set.len(), "Entity added");
        Ok(())
    }

    async fn update_entity(
        &self,
        ctx: &Context,
        kind: Kind,
        uuid: Uuid,
        node: UuidNode,
        write: EntityWrite<'_>,
        mut m: MutationSet,
    ) -> Result<()> {
        let identity = node
            .identity
            .ok_or_else(|| StrandError::NotFound(format!("{kind} {uuid}")))?;
        let entity = NodeRef::uid(identity);

        if write.action.is_some() {
            for subject in &node.subjects {
                m.disconnect(&NodeRef::uid(subject.clone()), p::ACTION_OF, &entity);
            }
        }
        write_entity(&mut m, &entity, &write, true);

        self.mutate(ctx, &m).await?;
        debug!(kind = %kind, %uuid, "Entity updated");
        Ok(())
    }

    async fn delete_entity(&self, ctx: &Context, kind: Kind, uuid: Uuid) -> Result<()> {
        let node = self
            .lookup_uuid(ctx, uuid)
            .await?
            .ok_or_else(|| StrandError::NotFound(format!("{kind} {uuid}")))?;

        let mut m = MutationSet::new();
        m.delete_node(&NodeRef::uid(node.anchor));
        if let Some(identity) = node.identity {
            let identity = NodeRef::uid(identity);
            for subject in node.subjects {
                m.disconnect(&NodeRef::uid(subject), p::ACTION_OF, &identity);
            }
            m.delete_node(&identity);
        }

        self.mutate(ctx, &m).await?;
        debug!(kind = %kind, %uuid, "Entity deleted");
        Ok(())
    }

    /// Count from a `total` query. A failed count is reported as zero so the
    /// page itself is still returned.
    async fn count(&self, ctx: &Context, query: &str, variables: &Variables) -> Result<i64> {
        match self.query(ctx, query, variables).await {
            Ok(nodes) => Ok(nodes
                .iter()
                .find_map(|n| n.find_prop(p::TOTAL))
                .and_then(Value::as_int)
                .unwrap_or_default()),
            Err(e @ StrandError::Canceled(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "Count query failed, reporting zero results");
                Ok(0)
            }
        }
    }

    async fn class_instances(&self, ctx: &Context, kind: Kind, class: &str) -> Result<Vec<ResultNode>> {
        self.query(
            ctx,
            queries::CLASS_INSTANCES,
            &vars(&[("class", kind.class_key(class))]),
        )
        .await
    }

    async fn define(&self, ctx: &Context, updates: impl IntoIterator<Item = SchemaUpdate>) -> Result<()> {
        for update in updates {
            ctx.run(self.client.define_schema(&update)).await?;
        }
        Ok(())
    }
}

fn scalar(value: &ScalarValue) -> Value {
    match value {
        ScalarValue::Int(i) => Value::Int(*i),
        ScalarValue::Number(n) => Value::Float(*n),
        ScalarValue::Bool(b) => Value::Bool(*b),
        ScalarValue::Str(s) => Value::Str(s.clone()),
    }
}

/// Append every edge of `write` on `entity`. With `overwrite`, each
/// predicate is wildcard-deleted first so values replace, never append.
fn write_entity(m: &mut MutationSet, entity: &NodeRef, write: &EntityWrite<'_>, overwrite: bool) {
    let clear = |m: &mut MutationSet, predicate: &str| {
        if overwrite {
            m.delete_predicate(entity, predicate);
        }
    };

    clear(m, p::TYPE);
    m.connect(entity, p::TYPE, &write.class);

    for &(name, ts) in &write.timestamps {
        clear(m, name);
        m.set_value(entity, name, Value::Int(ts));
    }

    clear(m, p::AT_CONTEXT);
    m.set_value(entity, p::AT_CONTEXT, Value::Str(write.context.to_string()));

    for (name, value) in write.schema {
        if let PropertyValue::Value(v) = value {
            clear(m, name.as_str());
            m.set_value(entity, name, scalar(v));
        }
    }
    for (name, uid) in &write.refs {
        clear(m, name.as_str());
        m.connect(entity, name, &NodeRef::uid(uid.clone()));
    }

    if let Some((target, subject)) = &write.action {
        clear(m, p::ACTION_TARGET);
        m.connect(entity, p::ACTION_TARGET, &NodeRef::uid(target.clone()));
        m.connect(&NodeRef::uid(subject.clone()), p::ACTION_OF, entity);
    }
}

/// Predicate declaration for one class property, if it needs one.
pub fn property_predicate(property: &Property) -> Option<SchemaUpdate> {
    let name = property.name.as_str();
    if property.data_type.is_reference() {
        return Some(SchemaUpdate::reverse(name));
    }
    if !property.indexed {
        return None;
    }
    Some(match property.data_type {
        DataType::String => SchemaUpdate::indexed(name, ValueType::String, &["exact", "term"]),
        DataType::Int => SchemaUpdate::indexed(name, ValueType::Int, &["int"]),
        DataType::Number => SchemaUpdate::indexed(name, ValueType::Float, &["float"]),
        DataType::Boolean => SchemaUpdate::indexed(name, ValueType::Bool, &["bool"]),
        DataType::Date => SchemaUpdate::indexed(name, ValueType::String, &["exact"]),
        DataType::CrossRef(_) => SchemaUpdate::reverse(name),
    })
}

/// Every predicate the connector relies on, plus the class properties of
/// `schema` that need a declaration. A predicate is declared once even if
/// several classes share its name.
pub fn base_predicates(schema: &Schema) -> Vec<SchemaUpdate> {
    let mut updates = vec![
        SchemaUpdate::indexed(p::CLASS, ValueType::String, &["exact", "term"]).counted(),
        SchemaUpdate::reverse(p::TYPE),
        SchemaUpdate::reverse(p::ID),
        SchemaUpdate::indexed(p::UUID, ValueType::String, &["exact", "term"]),
        SchemaUpdate::reverse(p::ACTION_OF),
        SchemaUpdate::reverse(p::ACTION_TARGET),
        SchemaUpdate::plain(p::AT_CONTEXT, ValueType::String),
    ];
    for ts in p::THING_TIMESTAMPS.iter().chain(p::ACTION_TIMESTAMPS.iter()) {
        updates.push(SchemaUpdate::indexed(ts, ValueType::Int, &["int"]));
    }

    let mut seen: HashSet<String> = updates.iter().map(|u| u.predicate.clone()).collect();
    for class in schema.things.classes.iter().chain(schema.actions.classes.iter()) {
        for property in &class.properties {
            if let Some(update) = property_predicate(property) {
                if seen.insert(update.predicate.clone()) {
                    updates.push(update);
                }
            }
        }
    }
    updates
}

#[async_trait]
impl<C: GraphClient> StorageConnector for DgraphConnector<C> {
    fn name(&self) -> &'static str {
        "dgraph"
    }

    async fn init(&self, ctx: &Context, sources: &SchemaSources, schema: &mut Schema) -> Result<()> {
        ctx.run(bootstrap::merge_sources(sources, schema)).await?;

        let existing: HashSet<String> = self
            .query(ctx, queries::ALL_CLASSES, &Variables::new())
            .await?
            .iter()
            .filter_map(|n| n.prop(p::CLASS).and_then(Value::as_str).map(str::to_string))
            .collect();

        let mut m = MutationSet::new();
        for kind in [Kind::Thing, Kind::Action] {
            for class in &schema.semantic_schema(kind).classes {
                let key = kind.class_key(&class.class);
                if !existing.contains(&key) {
                    let node = NodeRef::blank(format!("class{}", m.set.len()));
                    m.set_value(&node, p::CLASS, Value::Str(key));
                }
            }
        }

        self.define(ctx, base_predicates(schema)).await?;

        let created = m.set.len();
        if !m.is_empty() {
            self.mutate(ctx, &m).await?;
        }
        info!(connector = self.name(), classes_created = created, "Backend initialized");
        Ok(())
    }

    async fn add_thing(&self, ctx: &Context, thing: &Thing, uuid: Uuid) -> Result<()> {
        if self.lookup_uuid(ctx, uuid).await?.is_some() {
            return Err(StrandError::ValidationFailed(format!("uuid {uuid} already exists")));
        }
        let mut m = MutationSet::new();
        let write = self.prepare_thing(ctx, thing, &mut m).await?;
        self.add_entity(ctx, Kind::Thing, uuid, write, m).await
    }

    async fn get_thing(&self, ctx: &Context, uuid: Uuid) -> Result<ThingGetResponse> {
        let nodes = self
            .query(ctx, queries::GET_THING, &vars(&[("uuid", uuid.to_string())]))
            .await?;
        decode_entity(&nodes)
            .and_then(|e| e.into_thing())
            .ok_or_else(|| StrandError::NotFound(format!("thing {uuid}")))
    }

    async fn list_things(&self, ctx: &Context, page: Pagination) -> Result<ThingsListResponse> {
        let variables = vars(&[
            ("first", page.limit().to_string()),
            ("offset", page.offset().to_string()),
        ]);
        let nodes = self.query(ctx, queries::LIST_THINGS, &variables).await?;
        let things = nodes
            .iter()
            .filter_map(|n| decode_entity_node(n).into_thing())
            .collect();

        let total_results = self.count(ctx, queries::COUNT_THINGS, &Variables::new()).await?;
        Ok(ThingsListResponse {
            things,
            total_results,
        })
    }

    async fn update_thing(&self, ctx: &Context, thing: &Thing, uuid: Uuid) -> Result<()> {
        let node = self
            .lookup_uuid(ctx, uuid)
            .await?
            .ok_or_else(|| StrandError::NotFound(format!("thing {uuid}")))?;
        let mut m = MutationSet::new();
        let write = self.prepare_thing(ctx, thing, &mut m).await?;
        self.update_entity(ctx, Kind::Thing, uuid, node, write, m).await
    }

    async fn delete_thing(&self, ctx: &Context, uuid: Uuid) -> Result<()> {
        self.delete_entity(ctx, Kind::Thing, uuid).await
    }

    async fn add_action(&self, ctx: &Context, action: &Action, uuid: Uuid) -> Result<()> {
        if self.lookup_uuid(ctx, uuid).await?.is_some() {
            return Err(StrandError::ValidationFailed(format!("uuid {uuid} already exists")));
        }
        let mut m = MutationSet::new();
        let write = self.prepare_action(ctx, action, &mut m).await?;
        self.add_entity(ctx, Kind::Action, uuid, write, m).await
    }

    async fn get_action(&self, ctx: &Context, uuid: Uuid) -> Result<ActionGetResponse> {
        let nodes = self
            .query(ctx, queries::GET_ACTION, &vars(&[("uuid", uuid.to_string())]))
            .await?;
        decode_entity(&nodes)
            .map(DecodedEntity::into_action)
            .transpose()?
            .flatten()
            .ok_or_else(|| StrandError::NotFound(format!("action {uuid}")))
    }

    async fn list_actions(
        &self,
        ctx: &Context,
        thing: Uuid,
        page: Pagination,
    ) -> Result<ActionsListResponse> {
        let variables = vars(&[
            ("uuid", thing.to_string()),
            ("first", page.limit().to_string()),
            ("offset", page.offset().to_string()),
        ]);
        let nodes = self.query(ctx, queries::LIST_ACTIONS, &variables).await?;
        let target = nodes
            .iter()
            .find(|n| n.attribute == "target")
            .ok_or_else(|| StrandError::NotFound(format!("thing {thing}")))?;

        let actions = target
            .children_labeled(p::REVERSE_ID)
            .flat_map(|identity| identity.children_labeled("actions"))
            .map(|n| decode_entity_node(n).into_action())
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        let total_results = self
            .count(ctx, queries::COUNT_ACTIONS, &vars(&[("uuid", thing.to_string())]))
            .await?;
        Ok(ActionsListResponse {
            actions,
            total_results,
        })
    }

    async fn update_action(&self, ctx: &Context, action: &Action, uuid: Uuid) -> Result<()> {
        let node = self
            .lookup_uuid(ctx, uuid)
            .await?
            .ok_or_else(|| StrandError::NotFound(format!("action {uuid}")))?;
        let mut m = MutationSet::new();
        let write = self.prepare_action(ctx, action, &mut m).await?;
        self.update_entity(ctx, Kind::Action, uuid, node, write, m).await
    }

    async fn delete_action(&self, ctx: &Context, uuid: Uuid) -> Result<()> {
        self.delete_entity(ctx, Kind::Action, uuid).await
    }

    async fn get_meta(
        &self,
        ctx: &Context,
        kind: Kind,
        class: &Class,
        requests: &[MetaProperty],
    ) -> Result<MetaResult> {
        let fragment = build_meta_query(requests);
        if fragment.is_empty() {
            return Ok(decode_meta(&[], class, requests));
        }

        let query = format!("{}{}", queries::META_ROOT, fragment);
        let nodes = self
            .query(ctx, &query, &vars(&[("classKey", kind.class_key(&class.class))]))
            .await?;
        Ok(decode_meta(&nodes, class, requests))
    }

    async fn create_class(&self, ctx: &Context, kind: Kind, class: &Class) -> Result<()> {
        self.define(ctx, class.properties.iter().filter_map(property_predicate))
            .await?;

        let mut m = MutationSet::new();
        if let NodeRef::Blank(_) = self.class_node(ctx, kind, &class.class, &mut m).await? {
            self.mutate(ctx, &m).await?;
        }
        info!(kind = %kind, class = %class.class, "Class created in backend");
        Ok(())
    }

    async fn drop_class(&self, ctx: &Context, kind: Kind, class: &str) -> Result<()> {
        let mut m = MutationSet::new();
        let mut removed = 0usize;
        for node in self.class_instances(ctx, kind, class).await? {
            if let Some(uid) = node.uid() {
                m.delete_node(&NodeRef::uid(uid));
            }
            for identity in node.children_labeled(p::REVERSE_TYPE) {
                if let Some(uid) = identity.uid() {
                    m.delete_node(&NodeRef::uid(uid));
                    removed += 1;
                }
                for anchor in identity.children_labeled(p::ID) {
                    if let Some(uid) = anchor.uid() {
                        m.delete_node(&NodeRef::uid(uid));
                    }
                }
            }
        }

        if !m.is_empty() {
            self.mutate(ctx, &m).await?;
        }
        info!(kind = %kind, class, instances = removed, "Class dropped from backend");
        Ok(())
    }

    async fn add_property(
        &self,
        ctx: &Context,
        kind: Kind,
        class: &str,
        property: &Property,
    ) -> Result<()> {
        self.define(ctx, property_predicate(property)).await?;
        debug!(kind = %kind, class, property = %property.name, "Property added to backend");
        Ok(())
    }

    async fn drop_property(&self, ctx: &Context, kind: Kind, class: &str, property: &str) -> Result<()> {
        let mut m = MutationSet::new();
        for node in self.class_instances(ctx, kind, class).await? {
            for identity in node.children_labeled(p::REVERSE_TYPE) {
                if let Some(uid) = identity.uid() {
                    m.delete_predicate(&NodeRef::uid(uid), property);
                }
            }
        }

        let cleared = m.delete.len();
        if !m.is_empty() {
            self.mutate(ctx, &m).await?;
        }
        info!(kind = %kind, class, property, instances = cleared, "Property dropped from backend");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_predicates_cover_connector_edges() {
        let mut schema = Schema::default();
        schema.things.classes.push(
            Class::new("City")
                .with_property("name", DataType::String, true)
                .with_property("population", DataType::Int, false)
                .with_property("inCountry", DataType::CrossRef("Country".into()), false),
        );
        schema
            .things
            .classes
            .push(Class::new("Country").with_property("name", DataType::String, true));

        let lines: Vec<String> = base_predicates(&schema)
            .iter()
            .map(SchemaUpdate::to_schema_line)
            .collect();

        assert!(lines.contains(&"class: string @index(exact, term) @count .".to_string()));
        assert!(lines.contains(&"uuid: string @index(exact, term) .".to_string()));
        assert!(lines.contains(&"type: uid @reverse @count .".to_string()));
        assert!(lines.contains(&"lastUseTimeMs: int @index(int) .".to_string()));
        assert!(lines.contains(&"creationTimeUnix: int @index(int) .".to_string()));
        assert!(lines.contains(&"name: string @index(exact, term) .".to_string()));
        assert!(lines.contains(&"inCountry: uid @reverse @count .".to_string()));
        assert!(!lines.iter().any(|l| l.starts_with("population:")));
        assert_eq!(lines.iter().filter(|l| l.starts_with("name:")).count(), 1);
    }

    #[test]
    fn property_predicates_by_data_type() {
        let prop = |dt: DataType, indexed: bool| Property {
            name: "p".into(),
            data_type: dt,
            indexed,
            description: None,
        };

        let line = |dt, indexed| property_predicate(&prop(dt, indexed)).map(|u| u.to_schema_line());
        assert_eq!(line(DataType::Number, true).as_deref(), Some("p: float @index(float) ."));
        assert_eq!(line(DataType::Boolean, true).as_deref(), Some("p: bool @index(bool) ."));
        assert_eq!(line(DataType::Date, true).as_deref(), Some("p: string @index(exact) ."));
        assert_eq!(line(DataType::Date, false), None);
    }
}
