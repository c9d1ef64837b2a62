//! Decoding of entity result trees.
//!
//! The tree shape mirrors the query: the same `type` and `id` labels occur
//! under the entity itself, under its action target, under its subject, and
//! under every referenced entity. The decoder threads a [`ParseContext`]
//! down the recursion so each node is interpreted by where it sits, not by
//! comparing against its parent's label.

use std::collections::BTreeMap;

use uuid::Uuid;

use strand_core::{
    Action, ActionGetResponse, Kind, PropertyMap, PropertyValue, Result, ScalarValue, StrandError,
    Thing, ThingGetResponse,
};

use crate::queries::predicates as p;
use crate::tree::{ResultNode, Value};

/// Whose `type`/`id` node is being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Entity,
    Target,
    Subject,
    Reference(String),
}

/// Where in the tree a node sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseContext {
    /// Query block nodes above the entity (`get`, the UUID anchor).
    Root,
    /// The identity node of the requested entity.
    Entity,
    /// The class node reached through a `type` edge.
    Type(Owner),
    /// The UUID anchor reached through an `id` edge.
    Id(Owner),
    /// The thing an action targets (`action.target`).
    Target,
    /// The entity performing an action (`~action.of`).
    Subject,
    /// An entity referenced by the named property.
    Reference(String),
}

impl ParseContext {
    /// The context of a child reached through `label` from a node in `self`.
    fn child(&self, label: &str) -> Option<ParseContext> {
        match self {
            ParseContext::Root => Some(if label == p::REVERSE_ID {
                ParseContext::Entity
            } else {
                ParseContext::Root
            }),
            ParseContext::Entity => match label {
                p::TYPE => Some(ParseContext::Type(Owner::Entity)),
                p::ID => Some(ParseContext::Id(Owner::Entity)),
                p::ACTION_TARGET => Some(ParseContext::Target),
                p::REVERSE_ACTION_OF => Some(ParseContext::Subject),
                // Edges to the actions this entity performs.
                p::ACTION_OF => None,
                other => Some(ParseContext::Reference(other.to_string())),
            },
            ParseContext::Target => Self::owned(label, Owner::Target),
            ParseContext::Subject => Self::owned(label, Owner::Subject),
            ParseContext::Reference(name) => Self::owned(label, Owner::Reference(name.clone())),
            ParseContext::Type(_) | ParseContext::Id(_) => None,
        }
    }

    fn owned(label: &str, owner: Owner) -> Option<ParseContext> {
        match label {
            p::TYPE => Some(ParseContext::Type(owner)),
            p::ID => Some(ParseContext::Id(owner)),
            _ => None,
        }
    }
}

/// Everything recovered from one entity tree, before it is shaped into a
/// thing or action response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedEntity {
    pub uuid: Option<Uuid>,
    pub class_key: Option<String>,
    pub context: String,
    pub schema: PropertyMap,
    pub timestamps: BTreeMap<String, i64>,
    pub target: Option<Uuid>,
    pub subject: Option<Uuid>,
    seen_entity: bool,
}

impl DecodedEntity {
    fn timestamp(&self, name: &str) -> i64 {
        self.timestamps.get(name).copied().unwrap_or_default()
    }

    fn class_of(&self, kind: Kind) -> Option<String> {
        let key = self.class_key.as_deref()?;
        match Kind::parse_class_key(key) {
            Some((k, class)) if k == kind => Some(class.to_string()),
            _ => None,
        }
    }

    /// Shape into a thing. `None` if the tree held no thing.
    pub fn into_thing(self) -> Option<ThingGetResponse> {
        let thing_id = self.uuid?;
        let class = self.class_of(Kind::Thing)?;
        Some(ThingGetResponse {
            thing_id,
            thing: Thing {
                creation_time_ms: self.timestamp(p::CREATION_TIME_MS),
                last_seen_time_ms: self.timestamp(p::LAST_SEEN_TIME_MS),
                last_update_time_ms: self.timestamp(p::LAST_UPDATE_TIME_MS),
                last_use_time_ms: self.timestamp(p::LAST_USE_TIME_MS),
                context: self.context,
                class,
                schema: self.schema,
            },
        })
    }

    /// Shape into an action. `Ok(None)` if the tree held no action, and
    /// `Inconsistent` if the action's target or subject is gone.
    pub fn into_action(self) -> Result<Option<ActionGetResponse>> {
        let (Some(action_id), Some(class)) = (self.uuid, self.class_of(Kind::Action)) else {
            return Ok(None);
        };
        let thing_id = self.target.ok_or_else(|| {
            StrandError::Inconsistent(format!("action {action_id} has no target thing"))
        })?;
        let subject_id = self.subject.ok_or_else(|| {
            StrandError::Inconsistent(format!("action {action_id} has no subject"))
        })?;
        Ok(Some(ActionGetResponse {
            action_id,
            action: Action {
                creation_time_unix: self.timestamp(p::CREATION_TIME_UNIX),
                last_update_time_unix: self.timestamp(p::LAST_UPDATE_TIME_UNIX),
                thing_id,
                subject_id,
                context: self.context,
                class,
                schema: self.schema,
            },
        }))
    }
}

/// Decode the result of a point lookup, starting above the entity.
pub fn decode_entity(nodes: &[ResultNode]) -> Option<DecodedEntity> {
    let mut out = DecodedEntity::default();
    for node in nodes {
        decode_node(node, &ParseContext::Root, &mut out);
    }
    out.seen_entity.then_some(out)
}

/// Decode a list item, which is itself the entity's identity node.
pub fn decode_entity_node(node: &ResultNode) -> DecodedEntity {
    let mut out = DecodedEntity::default();
    decode_node(node, &ParseContext::Entity, &mut out);
    out
}

fn decode_node(node: &ResultNode, ctx: &ParseContext, out: &mut DecodedEntity) {
    match ctx {
        ParseContext::Entity => {
            out.seen_entity = true;
            for prop in &node.properties {
                decode_entity_prop(&prop.name, &prop.value, out);
            }
        }
        ParseContext::Type(Owner::Entity) => {
            if let Some(class) = node.prop(p::CLASS).and_then(Value::as_str) {
                out.class_key = Some(class.to_string());
            }
        }
        ParseContext::Id(owner) => {
            if let Some(uuid) = node
                .prop(p::UUID)
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                match owner {
                    Owner::Entity => out.uuid = Some(uuid),
                    Owner::Target => out.target = Some(uuid),
                    Owner::Subject => out.subject = Some(uuid),
                    Owner::Reference(name) => {
                        out.schema.insert(name.clone(), PropertyValue::Ref(uuid));
                    }
                }
            }
        }
        // Other owners' classes are not part of the response; root, target,
        // subject and reference nodes carry no fields of their own.
        _ => {}
    }

    for child in &node.children {
        if let Some(child_ctx) = ctx.child(&child.attribute) {
            decode_node(child, &child_ctx, out);
        }
    }
}

fn decode_entity_prop(name: &str, value: &Value, out: &mut DecodedEntity) {
    if p::THING_TIMESTAMPS.contains(&name) || p::ACTION_TIMESTAMPS.contains(&name) {
        if let Some(ts) = value.as_int() {
            out.timestamps.insert(name.to_string(), ts);
        }
        return;
    }

    match name {
        p::UID | p::UUID => {}
        p::AT_CONTEXT => {
            if let Some(ctx) = value.as_str() {
                out.context = ctx.to_string();
            }
        }
        _ => {
            let scalar = match value {
                Value::Str(s) => ScalarValue::Str(s.clone()),
                Value::Int(i) => ScalarValue::Int(*i),
                Value::Float(f) => ScalarValue::Number(*f),
                Value::Bool(b) => ScalarValue::Bool(*b),
                Value::Uid(_) => return,
            };
            out.schema
                .insert(name.to_string(), PropertyValue::Value(scalar));
        }
    }
}
