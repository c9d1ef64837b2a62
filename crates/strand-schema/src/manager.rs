//! The schema manager: authorized, serialized, persisted schema mutations.
//!
//! Every mutation runs under the schema lock as
//! authorize → lock → validate → mutate a copy → persist → publish → migrate.
//! A failed migration re-persists and re-publishes the previous schema.

use std::sync::Arc;

use tracing::{error, info, warn};

use strand_core::entity::{PropertyMap, PropertyValue, ScalarValue};
use strand_core::{
    Action, Class, Context, DataType, Kind, Principal, Property, Result, Schema, StrandError,
    Thing,
};
use strand_graph::queries::predicates;

use crate::auth::{schema_resource, verbs, Authorizer, ALL_SCHEMA};
use crate::lock::{SchemaHandle, SchemaLockGuard};
use crate::migrator::Migrator;
use crate::store::SchemaStore;

/// The backend change that follows a persisted schema mutation.
enum Migration {
    AddClass(Kind, Class),
    DropClass(Kind, String),
    AddProperty(Kind, String, Property),
    DropProperty(Kind, String, String),
}

impl Migration {
    fn describe(&self) -> String {
        match self {
            Migration::AddClass(kind, class) => format!("add {} class '{}'", kind.name(), class.class),
            Migration::DropClass(kind, class) => format!("drop {} class '{class}'", kind.name()),
            Migration::AddProperty(kind, class, property) => {
                format!("add property '{}' to {} class '{class}'", property.name, kind.name())
            }
            Migration::DropProperty(kind, class, property) => {
                format!("drop property '{property}' from {} class '{class}'", kind.name())
            }
        }
    }
}

pub struct SchemaManager {
    handle: SchemaHandle,
    store: Arc<dyn SchemaStore>,
    migrator: Arc<dyn Migrator>,
    authorizer: Arc<dyn Authorizer>,
}

impl SchemaManager {
    pub fn new(
        schema: Schema,
        store: Arc<dyn SchemaStore>,
        migrator: Arc<dyn Migrator>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            handle: SchemaHandle::new(schema),
            store,
            migrator,
            authorizer,
        }
    }

    /// Start from whatever the store holds.
    pub fn load(
        store: Arc<dyn SchemaStore>,
        migrator: Arc<dyn Migrator>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Result<Self> {
        let schema = store.load()?;
        Ok(Self::new(schema, store, migrator, authorizer))
    }

    pub fn handle(&self) -> &SchemaHandle {
        &self.handle
    }

    pub async fn get_schema(&self, principal: Option<&Principal>) -> Result<Schema> {
        self.authorizer
            .authorize(principal, verbs::LIST, ALL_SCHEMA)
            .await?;
        Ok(self.handle.snapshot())
    }

    pub async fn add_class(
        &self,
        ctx: &Context,
        principal: Option<&Principal>,
        kind: Kind,
        class: Class,
    ) -> Result<()> {
        self.authorizer
            .authorize(principal, verbs::CREATE, &schema_resource(kind))
            .await?;
        let guard = self.handle.lock_schema(ctx).await?;

        let old = guard.current();
        validate_class(&old, &class)?;
        if old.class(kind, &class.class).is_some() {
            return Err(StrandError::ValidationFailed(format!(
                "{} class '{}' already exists",
                kind.name(),
                class.class
            )));
        }

        let mut new = old.clone();
        new.semantic_schema_mut(kind).classes.push(class.clone());

        self.commit(ctx, guard, old, new, Migration::AddClass(kind, class))
            .await
    }

    pub async fn delete_class(
        &self,
        ctx: &Context,
        principal: Option<&Principal>,
        kind: Kind,
        name: &str,
    ) -> Result<()> {
        self.authorizer
            .authorize(principal, verbs::DELETE, &schema_resource(kind))
            .await?;
        let guard = self.handle.lock_schema(ctx).await?;

        let old = guard.current();
        let mut new = old.clone();
        if new.remove_class(kind, name).is_none() {
            return Err(class_not_found(kind, name));
        }

        self.commit(ctx, guard, old, new, Migration::DropClass(kind, name.to_string()))
            .await
    }

    pub async fn add_property(
        &self,
        ctx: &Context,
        principal: Option<&Principal>,
        kind: Kind,
        class: &str,
        property: Property,
    ) -> Result<()> {
        self.authorizer
            .authorize(principal, verbs::UPDATE, &schema_resource(kind))
            .await?;
        let guard = self.handle.lock_schema(ctx).await?;

        let old = guard.current();
        let mut new = old.clone();
        let target = new
            .semantic_schema_mut(kind)
            .class_mut(class)
            .ok_or_else(|| class_not_found(kind, class))?;

        validate_property_name(&property.name)?;
        if target.property(&property.name).is_some() {
            return Err(StrandError::ValidationFailed(format!(
                "property '{}' already exists on class '{class}'",
                property.name
            )));
        }
        if let DataType::CrossRef(referenced) = &property.data_type {
            if referenced != class && !old.class_exists(referenced) {
                return Err(StrandError::ValidationFailed(format!(
                    "property '{}' references unknown class '{referenced}'",
                    property.name
                )));
            }
        }
        target.properties.push(property.clone());

        let migration = Migration::AddProperty(kind, class.to_string(), property);
        self.commit(ctx, guard, old, new, migration).await
    }

    pub async fn delete_property(
        &self,
        ctx: &Context,
        principal: Option<&Principal>,
        kind: Kind,
        class: &str,
        property: &str,
    ) -> Result<()> {
        self.authorizer
            .authorize(principal, verbs::UPDATE, &schema_resource(kind))
            .await?;
        let guard = self.handle.lock_schema(ctx).await?;

        let old = guard.current();
        let mut new = old.clone();
        let target = new
            .semantic_schema_mut(kind)
            .class_mut(class)
            .ok_or_else(|| class_not_found(kind, class))?;
        let position = target
            .properties
            .iter()
            .position(|p| p.name == property)
            .ok_or_else(|| {
                StrandError::NotFound(format!("property '{property}' on class '{class}'"))
            })?;
        target.properties.remove(position);

        let migration = Migration::DropProperty(kind, class.to_string(), property.to_string());
        self.commit(ctx, guard, old, new, migration).await
    }

    /// Check a thing against the published schema.
    pub fn validate_thing(&self, thing: &Thing) -> Result<()> {
        let schema = self.handle.read();
        validate_entity(&schema, Kind::Thing, &thing.class, &thing.schema)
    }

    /// Check an action against the published schema.
    pub fn validate_action(&self, action: &Action) -> Result<()> {
        let schema = self.handle.read();
        validate_entity(&schema, Kind::Action, &action.class, &action.schema)
    }

    async fn commit(
        &self,
        ctx: &Context,
        guard: SchemaLockGuard<'_>,
        old: Schema,
        new: Schema,
        migration: Migration,
    ) -> Result<()> {
        ctx.check()?;
        self.store.save(&new)?;
        guard.publish(new);

        let result = match &migration {
            Migration::AddClass(kind, class) => self.migrator.add_class(ctx, *kind, class).await,
            Migration::DropClass(kind, class) => self.migrator.drop_class(ctx, *kind, class).await,
            Migration::AddProperty(kind, class, property) => {
                self.migrator.add_property(ctx, *kind, class, property).await
            }
            Migration::DropProperty(kind, class, property) => {
                self.migrator.drop_property(ctx, *kind, class, property).await
            }
        };

        match result {
            Ok(()) => {
                info!(change = %migration.describe(), "Schema updated");
                Ok(())
            }
            Err(err) => {
                warn!(change = %migration.describe(), error = %err, "Migration failed, rolling back schema");
                if let Err(rollback) = self.store.save(&old) {
                    error!(change = %migration.describe(), error = %rollback, "Schema rollback failed");
                    return Err(StrandError::Inconsistent(format!(
                        "{}: migration failed ({err}) and rollback failed ({rollback})",
                        migration.describe()
                    )));
                }
                guard.publish(old);
                Err(err)
            }
        }
    }
}

fn class_not_found(kind: Kind, name: &str) -> StrandError {
    StrandError::NotFound(format!("{} class '{name}'", kind.name()))
}

fn is_alphanumeric(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric())
}

fn validate_class_name(name: &str) -> Result<()> {
    if !name.starts_with(|c: char| c.is_ascii_uppercase()) || !is_alphanumeric(name) {
        return Err(StrandError::ValidationFailed(format!(
            "class name '{name}' must start with an upper-case letter and be alphanumeric"
        )));
    }
    Ok(())
}

fn validate_property_name(name: &str) -> Result<()> {
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) || !is_alphanumeric(name) {
        return Err(StrandError::ValidationFailed(format!(
            "property name '{name}' must start with a lower-case letter and be alphanumeric"
        )));
    }
    if predicates::is_reserved(name) {
        return Err(StrandError::ValidationFailed(format!(
            "property name '{name}' is reserved"
        )));
    }
    Ok(())
}

fn validate_class(schema: &Schema, class: &Class) -> Result<()> {
    validate_class_name(&class.class)?;

    for (i, property) in class.properties.iter().enumerate() {
        validate_property_name(&property.name)?;
        if class.properties[..i].iter().any(|p| p.name == property.name) {
            return Err(StrandError::ValidationFailed(format!(
                "duplicate property '{}' on class '{}'",
                property.name, class.class
            )));
        }
        if let DataType::CrossRef(referenced) = &property.data_type {
            if *referenced != class.class && !schema.class_exists(referenced) {
                return Err(StrandError::ValidationFailed(format!(
                    "property '{}' references unknown class '{referenced}'",
                    property.name
                )));
            }
        }
    }
    Ok(())
}

fn validate_entity(schema: &Schema, kind: Kind, class: &str, values: &PropertyMap) -> Result<()> {
    let class_def = schema
        .class(kind, class)
        .ok_or_else(|| class_not_found(kind, class))?;

    for (name, value) in values {
        let property = class_def.property(name).ok_or_else(|| {
            StrandError::ValidationFailed(format!("class '{class}' has no property '{name}'"))
        })?;
        if !compatible(&property.data_type, value) {
            return Err(StrandError::ValidationFailed(format!(
                "property '{name}' expects {}",
                property.data_type
            )));
        }
    }
    Ok(())
}

fn compatible(data_type: &DataType, value: &PropertyValue) -> bool {
    match (data_type, value) {
        (DataType::CrossRef(_), PropertyValue::Ref(_)) => true,
        (DataType::CrossRef(_), PropertyValue::Value(_)) => false,
        (_, PropertyValue::Ref(_)) => false,
        (DataType::String | DataType::Date, PropertyValue::Value(ScalarValue::Str(_))) => true,
        (DataType::Int, PropertyValue::Value(ScalarValue::Int(_))) => true,
        (DataType::Number, PropertyValue::Value(ScalarValue::Number(_) | ScalarValue::Int(_))) => {
            true
        }
        (DataType::Boolean, PropertyValue::Value(ScalarValue::Bool(_))) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn schema_with_city() -> Schema {
        let mut schema = Schema::default();
        schema.things.classes.push(
            Class::new("City")
                .with_property("name", DataType::String, true)
                .with_property("population", DataType::Int, false)
                .with_property("area", DataType::Number, false),
        );
        schema
    }

    #[test]
    fn class_names_must_be_capitalized_alphanumerics() {
        assert!(validate_class_name("City").is_ok());
        assert!(validate_class_name("City2").is_ok());
        assert!(validate_class_name("city").is_err());
        assert!(validate_class_name("").is_err());
        assert!(validate_class_name("New City").is_err());
    }

    #[test]
    fn property_names_must_be_lowercase_alphanumerics() {
        assert!(validate_property_name("name").is_ok());
        assert!(validate_property_name("inCountry").is_ok());
        assert!(validate_property_name("Name").is_err());
        assert!(validate_property_name("in_country").is_err());
    }

    #[test]
    fn structural_names_are_reserved() {
        let names = [
            "uuid",
            "id",
            "type",
            "class",
            "atContext",
            "creationTimeMs",
            "lastUseTimeMs",
            "creationTimeUnix",
        ];
        for name in names {
            let err = validate_property_name(name).unwrap_err();
            assert!(matches!(err, StrandError::ValidationFailed(_)), "{name}");
        }

        let class = Class::new("Person").with_property("id", DataType::CrossRef("Person".into()), false);
        assert!(validate_class(&Schema::default(), &class).is_err());
    }

    #[test]
    fn duplicate_properties_are_rejected() {
        let class = Class::new("Town")
            .with_property("name", DataType::String, true)
            .with_property("name", DataType::Int, false);
        let err = validate_class(&Schema::default(), &class).unwrap_err();
        assert!(matches!(err, StrandError::ValidationFailed(_)));
    }

    #[test]
    fn cross_refs_must_resolve() {
        let schema = schema_with_city();

        let ok = Class::new("Person")
            .with_property("livesIn", DataType::CrossRef("City".into()), false)
            .with_property("friend", DataType::CrossRef("Person".into()), false);
        assert!(validate_class(&schema, &ok).is_ok());

        let bad = Class::new("Person").with_property("worksAt", DataType::CrossRef("Company".into()), false);
        assert!(validate_class(&schema, &bad).is_err());
    }

    #[test]
    fn entity_values_must_match_declared_types() {
        let schema = schema_with_city();
        let mut values = PropertyMap::new();
        values.insert("name".into(), PropertyValue::value("Amsterdam"));
        values.insert("population".into(), PropertyValue::value(800_000i64));
        values.insert("area".into(), PropertyValue::value(219i64));
        assert!(validate_entity(&schema, Kind::Thing, "City", &values).is_ok());

        values.insert("population".into(), PropertyValue::Ref(Uuid::new_v4()));
        assert!(validate_entity(&schema, Kind::Thing, "City", &values).is_err());
    }

    #[test]
    fn entity_of_unknown_class_is_not_found() {
        let err = validate_entity(&schema_with_city(), Kind::Action, "City", &PropertyMap::new())
            .unwrap_err();
        assert!(matches!(err, StrandError::NotFound(_)));
    }

    #[test]
    fn undeclared_property_fails_validation() {
        let mut values = PropertyMap::new();
        values.insert("mayor".into(), PropertyValue::value("someone"));
        let err = validate_entity(&schema_with_city(), Kind::Thing, "City", &values).unwrap_err();
        assert!(matches!(err, StrandError::ValidationFailed(_)));
    }
}
