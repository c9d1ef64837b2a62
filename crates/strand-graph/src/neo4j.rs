//! Neo4j connection management and the Cypher storage connector.
//!
//! Graph model:
//!
//! ```text
//! (:Entity {kind, atContext, schema, <timestamps>})-[:TYPE]->(:Class {class})
//! (:Entity)-[:ID]->(:Uuid {uuid})
//! (:Entity)-[:REF {name}]->(:Entity)
//! (subject:Entity)-[:ACTION_OF]->(action:Entity)-[:ACTION_TARGET]->(target:Entity)
//! ```
//!
//! Scalar properties are kept as one JSON map in `schema`; references are
//! relationships so they can be followed and counted.

use std::collections::BTreeMap;

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Query, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use strand_core::config::{GraphConfig, SchemaSources};
use strand_core::{
    Action, ActionGetResponse, ActionsListResponse, Class, Context, Kind, MetaProperty,
    MetaResult, Pagination, Property, PropertyMap, PropertyValue, Result, ScalarValue, Schema,
    StrandError, Thing, ThingGetResponse, ThingsListResponse,
};

use crate::bootstrap;
use crate::client::GraphError;
use crate::connector::StorageConnector;
use crate::decode::DecodedEntity;
use crate::meta::summarize;
use crate::queries::predicates as p;

/// Thread-safe Neo4j client with connection pooling.
///
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct Neo4jClient {
    graph: Graph,
}

impl Neo4jClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> std::result::Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    pub fn inner(&self) -> &Graph {
        &self.graph
    }

    /// Execute a write-only query.
    pub async fn run(&self, query: Query) -> std::result::Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a read query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> std::result::Result<Vec<Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a read query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> std::result::Result<Option<Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }

    /// Run all queries in one transaction; nothing is applied unless every
    /// query succeeds.
    pub async fn run_in_txn(&self, queries: Vec<Query>) -> std::result::Result<(), GraphError> {
        let mut txn = self.graph.start_txn().await?;
        for q in queries {
            txn.run(q).await?;
        }
        txn.commit().await?;
        Ok(())
    }
}

// ── Cypher ───────────────────────────────────────────────────────

const ENTITY_BY_UUID: &str = "MATCH (e:Entity {kind: $kind})-[:ID]->(:Uuid {uuid: $uuid})";

/// Appended after a MATCH binding `e`; returns one row per entity.
const ENTITY_PROJECTION: &str = "
MATCH (e)-[:TYPE]->(c:Class)
MATCH (e)-[:ID]->(u:Uuid)
OPTIONAL MATCH (e)-[:ACTION_TARGET]->(:Entity)-[:ID]->(tu:Uuid)
OPTIONAL MATCH (su:Uuid)<-[:ID]-(:Entity)-[:ACTION_OF]->(e)
OPTIONAL MATCH (e)-[r:REF]->(:Entity)-[:ID]->(ru:Uuid)
WITH e, c, u, tu, su, collect(r.name) AS ref_names, collect(ru.uuid) AS ref_uuids
RETURN e, c.class AS class, u.uuid AS uuid, tu.uuid AS target, su.uuid AS subject,
       ref_names, ref_uuids";

const CONSTRAINTS: [&str; 3] = [
    "CREATE CONSTRAINT strand_class_key IF NOT EXISTS FOR (c:Class) REQUIRE c.class IS UNIQUE",
    "CREATE CONSTRAINT strand_uuid IF NOT EXISTS FOR (u:Uuid) REQUIRE u.uuid IS UNIQUE",
    "CREATE INDEX strand_entity_kind IF NOT EXISTS FOR (e:Entity) ON (e.kind)",
];

fn timestamps_of(kind: Kind) -> &'static [&'static str] {
    match kind {
        Kind::Thing => &p::THING_TIMESTAMPS,
        Kind::Action => &p::ACTION_TIMESTAMPS,
    }
}

/// `SET e.a = $a, e.b = $b` over the kind's timestamp names.
fn set_timestamps(kind: Kind) -> String {
    let assignments: Vec<String> = timestamps_of(kind)
        .iter()
        .map(|ts| format!("e.{ts} = ${ts}"))
        .collect();
    format!("SET {}", assignments.join(", "))
}

/// The backend-facing fields of a thing or action.
struct EntityWrite<'a> {
    kind: Kind,
    class: &'a str,
    context: &'a str,
    schema: &'a PropertyMap,
    timestamps: Vec<(&'static str, i64)>,
    /// Target and subject UUIDs of an action.
    action: Option<(Uuid, Uuid)>,
}

impl<'a> EntityWrite<'a> {
    fn thing(thing: &'a Thing) -> Self {
        Self {
            kind: Kind::Thing,
            class: &thing.class,
            context: &thing.context,
            schema: &thing.schema,
            timestamps: vec![
                (p::CREATION_TIME_MS, thing.creation_time_ms),
                (p::LAST_SEEN_TIME_MS, thing.last_seen_time_ms),
                (p::LAST_UPDATE_TIME_MS, thing.last_update_time_ms),
                (p::LAST_USE_TIME_MS, thing.last_use_time_ms),
            ],
            action: None,
        }
    }

    fn action(action: &'a Action) -> Self {
        Self {
            kind: Kind::Action,
            class: &action.class,
            context: &action.context,
            schema: &action.schema,
            timestamps: vec![
                (p::CREATION_TIME_UNIX, action.creation_time_unix),
                (p::LAST_UPDATE_TIME_UNIX, action.last_update_time_unix),
            ],
            action: Some((action.thing_id, action.subject_id)),
        }
    }

    fn scalars(&self) -> BTreeMap<&str, &ScalarValue> {
        self.schema
            .iter()
            .filter_map(|(k, v)| match v {
                PropertyValue::Value(s) => Some((k.as_str(), s)),
                PropertyValue::Ref(_) => None,
            })
            .collect()
    }

    fn refs(&self) -> impl Iterator<Item = (&str, Uuid)> {
        self.schema.iter().filter_map(|(k, v)| match v {
            PropertyValue::Ref(id) => Some((k.as_str(), *id)),
            PropertyValue::Value(_) => None,
        })
    }

    /// Every UUID the write depends on, with what it is used for.
    fn dependencies(&self) -> Vec<(String, Uuid)> {
        let mut deps: Vec<(String, Uuid)> = self
            .refs()
            .map(|(name, id)| (format!("entity referenced by '{name}'"), id))
            .collect();
        if let Some((target, subject)) = self.action {
            deps.push(("action target".to_string(), target));
            deps.push(("action subject".to_string(), subject));
        }
        deps
    }
}

fn schema_from_json(raw: &str) -> std::result::Result<PropertyMap, GraphError> {
    if raw.is_empty() {
        return Ok(PropertyMap::new());
    }
    let scalars: BTreeMap<String, ScalarValue> = serde_json::from_str(raw)
        .map_err(|e| GraphError::Serialization(format!("entity schema: {e}")))?;
    Ok(scalars
        .into_iter()
        .map(|(k, v)| (k, PropertyValue::Value(v)))
        .collect())
}

fn parse_uuid(row: &Row, column: &str) -> Option<Uuid> {
    row.get::<String>(column)
        .ok()
        .and_then(|s| Uuid::parse_str(&s).ok())
}

/// Reference properties returned as two parallel columns.
fn add_refs(row: &Row, schema: &mut PropertyMap) {
    let names: Vec<String> = row.get("ref_names").unwrap_or_default();
    let uuids: Vec<String> = row.get("ref_uuids").unwrap_or_default();
    for (name, id) in names.into_iter().zip(uuids) {
        if let Ok(id) = Uuid::parse_str(&id) {
            schema.insert(name, PropertyValue::Ref(id));
        }
    }
}

fn decode_row(row: &Row) -> std::result::Result<DecodedEntity, GraphError> {
    let node: neo4rs::Node = row
        .get("e")
        .map_err(|e| GraphError::Serialization(format!("Failed to deserialize entity: {e}")))?;

    let mut decoded = DecodedEntity::default();
    decoded.uuid = parse_uuid(row, "uuid");
    decoded.class_key = row.get::<String>("class").ok();
    decoded.context = node.get::<String>(p::AT_CONTEXT).unwrap_or_default();
    decoded.schema = schema_from_json(&node.get::<String>("schema").unwrap_or_default())?;
    add_refs(row, &mut decoded.schema);
    for ts in p::THING_TIMESTAMPS.iter().chain(p::ACTION_TIMESTAMPS.iter()) {
        if let Ok(v) = node.get::<i64>(ts) {
            decoded.timestamps.insert((*ts).to_string(), v);
        }
    }
    decoded.target = parse_uuid(row, "target");
    decoded.subject = parse_uuid(row, "subject");
    Ok(decoded)
}

// ── Connector ────────────────────────────────────────────────────

pub struct Neo4jConnector {
    client: Neo4jClient,
}

impl Neo4jConnector {
    pub fn new(client: Neo4jClient) -> Self {
        Self { client }
    }

    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        Ok(Self::new(Neo4jClient::connect(config).await?))
    }

    pub fn client(&self) -> &Neo4jClient {
        &self.client
    }

    async fn count(&self, ctx: &Context, q: Query) -> Result<i64> {
        let row = ctx.run(self.client.query_one(q)).await?;
        Ok(row.and_then(|r| r.get::<i64>("cnt").ok()).unwrap_or(0))
    }

    async fn uuid_exists(&self, ctx: &Context, uuid: Uuid) -> Result<bool> {
        let q = query("MATCH (u:Uuid {uuid: $uuid}) RETURN count(u) AS cnt")
            .param("uuid", uuid.to_string());
        Ok(self.count(ctx, q).await? > 0)
    }

    /// Fail with `NotFound` unless every dependency is an existing entity.
    async fn check_dependencies(&self, ctx: &Context, write: &EntityWrite<'_>) -> Result<()> {
        for (what, id) in write.dependencies() {
            let q = query("MATCH (e:Entity)-[:ID]->(:Uuid {uuid: $uuid}) RETURN count(e) AS cnt")
                .param("uuid", id.to_string());
            if self.count(ctx, q).await? == 0 {
                return Err(StrandError::NotFound(format!("{what} {id}")));
            }
        }
        Ok(())
    }

    async fn fetch_one(&self, ctx: &Context, kind: Kind, uuid: Uuid) -> Result<Option<DecodedEntity>> {
        let q = query(&format!("{ENTITY_BY_UUID}{ENTITY_PROJECTION}"))
            .param("kind", kind.name())
            .param("uuid", uuid.to_string());
        match ctx.run(self.client.query_one(q)).await? {
            Some(row) => Ok(Some(decode_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn fetch_many(&self, ctx: &Context, q: Query) -> Result<Vec<DecodedEntity>> {
        let rows = ctx.run(self.client.query_rows(q)).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(decode_row(row)?);
        }
        Ok(out)
    }

    /// Count for a list response; failures are reported as zero.
    async fn total(&self, ctx: &Context, q: Query) -> Result<i64> {
        match self.count(ctx, q).await {
            Ok(n) => Ok(n),
            Err(e @ StrandError::Canceled(_)) => Err(e),
            Err(e) => {
                warn!(error = %e, "Count query failed, reporting zero results");
                Ok(0)
            }
        }
    }

    /// Queries that attach class, properties, references and action edges
    /// to the entity with `uuid`.
    fn link_queries(write: &EntityWrite<'_>, uuid: Uuid, schema_json: String) -> Vec<Query> {
        let mut queries = Vec::new();

        let mut attach = query(&format!(
            "{ENTITY_BY_UUID}
             MERGE (c:Class {{class: $class}})
             CREATE (e)-[:TYPE]->(c)
             SET e.atContext = $context, e.schema = $schema
             {}",
            set_timestamps(write.kind)
        ))
        .param("kind", write.kind.name())
        .param("uuid", uuid.to_string())
        .param("class", write.kind.class_key(write.class))
        .param("context", write.context.to_string())
        .param("schema", schema_json);
        for (name, ts) in &write.timestamps {
            attach = attach.param(name, *ts);
        }
        queries.push(attach);

        for (name, target) in write.refs() {
            queries.push(
                query(&format!(
                    "{ENTITY_BY_UUID}
                     MATCH (t:Entity)-[:ID]->(:Uuid {{uuid: $target}})
                     CREATE (e)-[:REF {{name: $name}}]->(t)"
                ))
                .param("kind", write.kind.name())
                .param("uuid", uuid.to_string())
                .param("target", target.to_string())
                .param("name", name.to_string()),
            );
        }

        if let Some((target, subject)) = write.action {
            queries.push(
                query(&format!(
                    "{ENTITY_BY_UUID}
                     MATCH (t:Entity)-[:ID]->(:Uuid {{uuid: $target}})
                     MATCH (s:Entity)-[:ID]->(:Uuid {{uuid: $subject}})
                     CREATE (s)-[:ACTION_OF]->(e)-[:ACTION_TARGET]->(t)"
                ))
                .param("kind", write.kind.name())
                .param("uuid", uuid.to_string())
                .param("target", target.to_string())
                .param("subject", subject.to_string()),
            );
        }

        queries
    }

    async fn add_entity(&self, ctx: &Context, write: EntityWrite<'_>, uuid: Uuid) -> Result<()> {
        if self.uuid_exists(ctx, uuid).await? {
            return Err(StrandError::ValidationFailed(format!("uuid {uuid} already exists")));
        }
        self.check_dependencies(ctx, &write).await?;

        let schema_json = serde_json::to_string(&write.scalars())?;
        let mut queries = vec![query(
            "CREATE (e:Entity {kind: $kind})-[:ID]->(:Uuid {uuid: $uuid})",
        )
        .param("kind", write.kind.name())
        .param("uuid", uuid.to_string())];
        queries.extend(Self::link_queries(&write, uuid, schema_json));

        ctx.run(self.client.run_in_txn(queries)).await?;
        debug!(kind = %write.kind, %uuid, "Entity added");
        Ok(())
    }

    async fn update_entity(&self, ctx: &Context, write: EntityWrite<'_>, uuid: Uuid) -> Result<()> {
        let existing = self
            .fetch_one(ctx, write.kind, uuid)
            .await?
            .ok_or_else(|| StrandError::NotFound(format!("{} {uuid}", write.kind)))?;
        self.check_dependencies(ctx, &write).await?;

        // Written scalars replace their old values; the rest are kept.
        let mut scalars: BTreeMap<String, ScalarValue> = existing
            .schema
            .into_iter()
            .filter_map(|(k, v)| match v {
                PropertyValue::Value(s) => Some((k, s)),
                PropertyValue::Ref(_) => None,
            })
            .collect();
        for (k, v) in write.scalars() {
            scalars.insert(k.to_string(), v.clone());
        }
        let schema_json = serde_json::to_string(&scalars)?;

        let ref_names: Vec<String> = write.refs().map(|(name, _)| name.to_string()).collect();
        let mut detach = format!(
            "{ENTITY_BY_UUID}
             OPTIONAL MATCH (e)-[t:TYPE]->()
             DELETE t
             WITH e
             OPTIONAL MATCH (e)-[r:REF]->()
             WHERE r.name IN $ref_names
             DELETE r"
        );
        if write.action.is_some() {
            detach.push_str(
                "
             WITH e
             OPTIONAL MATCH (e)-[a:ACTION_TARGET]->()
             DELETE a
             WITH e
             OPTIONAL MATCH ()-[o:ACTION_OF]->(e)
             DELETE o",
            );
        }

        let mut queries = vec![query(&detach)
            .param("kind", write.kind.name())
            .param("uuid", uuid.to_string())
            .param("ref_names", ref_names)];
        queries.extend(Self::link_queries(&write, uuid, schema_json));

        ctx.run(self.client.run_in_txn(queries)).await?;
        debug!(kind = %write.kind, %uuid, "Entity updated");
        Ok(())
    }

    async fn delete_entity(&self, ctx: &Context, kind: Kind, uuid: Uuid) -> Result<()> {
        let q = query(
            "MATCH (e:Entity {kind: $kind})-[:ID]->(u:Uuid {uuid: $uuid})
             DETACH DELETE e, u
             RETURN count(u) AS cnt",
        )
        .param("kind", kind.name())
        .param("uuid", uuid.to_string());

        if self.count(ctx, q).await? == 0 {
            return Err(StrandError::NotFound(format!("{kind} {uuid}")));
        }
        debug!(kind = %kind, %uuid, "Entity deleted");
        Ok(())
    }

    async fn instances(&self, ctx: &Context, kind: Kind, class: &str) -> Result<Vec<Row>> {
        let q = query(
            "MATCH (e:Entity)-[:TYPE]->(:Class {class: $class})
             MATCH (e)-[:ID]->(u:Uuid)
             OPTIONAL MATCH (e)-[r:REF]->(:Entity)-[:ID]->(ru:Uuid)
             RETURN u.uuid AS uuid, e.schema AS schema,
                    collect(r.name) AS ref_names, collect(ru.uuid) AS ref_uuids",
        )
        .param("class", kind.class_key(class));
        ctx.run(self.client.query_rows(q)).await
    }
}

#[async_trait]
impl StorageConnector for Neo4jConnector {
    fn name(&self) -> &'static str {
        "neo4j"
    }

    async fn init(&self, ctx: &Context, sources: &SchemaSources, schema: &mut Schema) -> Result<()> {
        ctx.run(bootstrap::merge_sources(sources, schema)).await?;

        for statement in CONSTRAINTS {
            ctx.run(self.client.run(query(statement))).await?;
        }

        let mut queries = Vec::new();
        for kind in [Kind::Thing, Kind::Action] {
            for class in &schema.semantic_schema(kind).classes {
                queries.push(
                    query("MERGE (:Class {class: $class})")
                        .param("class", kind.class_key(&class.class)),
                );
            }
        }
        let classes = queries.len();
        if !queries.is_empty() {
            ctx.run(self.client.run_in_txn(queries)).await?;
        }

        info!(connector = self.name(), classes, "Backend initialized");
        Ok(())
    }

    async fn add_thing(&self, ctx: &Context, thing: &Thing, uuid: Uuid) -> Result<()> {
        self.add_entity(ctx, EntityWrite::thing(thing), uuid).await
    }

    async fn get_thing(&self, ctx: &Context, uuid: Uuid) -> Result<ThingGetResponse> {
        self.fetch_one(ctx, Kind::Thing, uuid)
            .await?
            .and_then(DecodedEntity::into_thing)
            .ok_or_else(|| StrandError::NotFound(format!("thing {uuid}")))
    }

    async fn list_things(&self, ctx: &Context, page: Pagination) -> Result<ThingsListResponse> {
        let q = query(&format!(
            "MATCH (e:Entity {{kind: $kind}}){ENTITY_PROJECTION}
             ORDER BY e.{} DESC SKIP $offset LIMIT $first",
            p::CREATION_TIME_MS
        ))
        .param("kind", Kind::Thing.name())
        .param("offset", page.offset() as i64)
        .param("first", i64::from(page.limit()));

        let things = self
            .fetch_many(ctx, q)
            .await?
            .into_iter()
            .filter_map(DecodedEntity::into_thing)
            .collect();

        let total_results = self
            .total(
                ctx,
                query("MATCH (e:Entity {kind: $kind}) RETURN count(e) AS cnt")
                    .param("kind", Kind::Thing.name()),
            )
            .await?;
        Ok(ThingsListResponse {
            things,
            total_results,
        })
    }

    async fn update_thing(&self, ctx: &Context, thing: &Thing, uuid: Uuid) -> Result<()> {
        self.update_entity(ctx, EntityWrite::thing(thing), uuid).await
    }

    async fn delete_thing(&self, ctx: &Context, uuid: Uuid) -> Result<()> {
        self.delete_entity(ctx, Kind::Thing, uuid).await
    }

    async fn add_action(&self, ctx: &Context, action: &Action, uuid: Uuid) -> Result<()> {
        self.add_entity(ctx, EntityWrite::action(action), uuid).await
    }

    async fn get_action(&self, ctx: &Context, uuid: Uuid) -> Result<ActionGetResponse> {
        self.fetch_one(ctx, Kind::Action, uuid)
            .await?
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
        if self.fetch_one(ctx, Kind::Thing, thing).await?.is_none() {
            return Err(StrandError::NotFound(format!("thing {thing}")));
        }

        let q = query(&format!(
            "MATCH (e:Entity {{kind: $kind}})-[:ACTION_TARGET]->(:Entity)-[:ID]->(:Uuid {{uuid: $target}})
             {ENTITY_PROJECTION}
             ORDER BY e.{} DESC SKIP $offset LIMIT $first",
            p::CREATION_TIME_UNIX
        ))
        .param("kind", Kind::Action.name())
        .param("target", thing.to_string())
        .param("offset", page.offset() as i64)
        .param("first", i64::from(page.limit()));

        let actions = self
            .fetch_many(ctx, q)
            .await?
            .into_iter()
            .map(DecodedEntity::into_action)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        let total_results = self
            .total(
                ctx,
                query(
                    "MATCH (e:Entity {kind: $kind})-[:ACTION_TARGET]->(:Entity)-[:ID]->(:Uuid {uuid: $target})
                     RETURN count(e) AS cnt",
                )
                .param("kind", Kind::Action.name())
                .param("target", thing.to_string()),
            )
            .await?;
        Ok(ActionsListResponse {
            actions,
            total_results,
        })
    }

    async fn update_action(&self, ctx: &Context, action: &Action, uuid: Uuid) -> Result<()> {
        self.update_entity(ctx, EntityWrite::action(action), uuid).await
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
        let rows = self.instances(ctx, kind, &class.class).await?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut schema = schema_from_json(&row.get::<String>("schema").unwrap_or_default())?;
            add_refs(row, &mut schema);
            entities.push(schema);
        }
        Ok(summarize(&entities, class, requests))
    }

    async fn create_class(&self, ctx: &Context, kind: Kind, class: &Class) -> Result<()> {
        let q = query("MERGE (:Class {class: $class})").param("class", kind.class_key(&class.class));
        ctx.run(self.client.run(q)).await?;
        info!(kind = %kind, class = %class.class, "Class created in backend");
        Ok(())
    }

    async fn drop_class(&self, ctx: &Context, kind: Kind, class: &str) -> Result<()> {
        let q = query(
            "MATCH (c:Class {class: $class})
             OPTIONAL MATCH (e:Entity)-[:TYPE]->(c)
             OPTIONAL MATCH (e)-[:ID]->(u:Uuid)
             WITH c, collect(DISTINCT e) AS entities, collect(DISTINCT u) AS anchors
             FOREACH (n IN entities | DETACH DELETE n)
             FOREACH (n IN anchors | DETACH DELETE n)
             DETACH DELETE c
             RETURN size(entities) AS cnt",
        )
        .param("class", kind.class_key(class));

        let removed = self.count(ctx, q).await?;
        info!(kind = %kind, class, instances = removed, "Class dropped from backend");
        Ok(())
    }

    async fn add_property(
        &self,
        _ctx: &Context,
        kind: Kind,
        class: &str,
        property: &Property,
    ) -> Result<()> {
        // Properties live in the schema map; nothing to declare.
        debug!(kind = %kind, class, property = %property.name, "Property added");
        Ok(())
    }

    async fn drop_property(&self, ctx: &Context, kind: Kind, class: &str, property: &str) -> Result<()> {
        let mut queries = Vec::new();
        for row in self.instances(ctx, kind, class).await? {
            let Ok(uuid) = row.get::<String>("uuid") else {
                continue;
            };
            let mut scalars: BTreeMap<String, ScalarValue> =
                match row.get::<String>("schema").ok().filter(|s| !s.is_empty()) {
                    Some(raw) => serde_json::from_str(&raw)?,
                    None => BTreeMap::new(),
                };
            if scalars.remove(property).is_some() {
                queries.push(
                    query("MATCH (e:Entity)-[:ID]->(:Uuid {uuid: $uuid}) SET e.schema = $schema")
                        .param("uuid", uuid.clone())
                        .param("schema", serde_json::to_string(&scalars)?),
                );
            }
        }
        queries.push(
            query(
                "MATCH (e:Entity)-[:TYPE]->(:Class {class: $class})
                 MATCH (e)-[r:REF {name: $name}]->()
                 DELETE r",
            )
            .param("class", kind.class_key(class))
            .param("name", property.to_string()),
        );

        let cleared = queries.len() - 1;
        ctx.run(self.client.run_in_txn(queries)).await?;
        info!(kind = %kind, class, property, instances = cleared, "Property dropped from backend");
        Ok(())
    }
}
