//! Schema model shared by the schema manager and every storage connector.
//!
//! A [`Schema`] holds one [`SemanticSchema`] per [`Kind`]; each of those is an
//! ordered list of [`Class`] definitions with typed [`Property`] entries.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Kind ──────────────────────────────────────────────────────────

/// The two built-in entity kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Thing,
    Action,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Thing => "thing",
            Kind::Action => "action",
        }
    }

    /// Plural form, used in authorization resources (`schema/things`).
    pub fn plural(&self) -> &'static str {
        match self {
            Kind::Thing => "things",
            Kind::Action => "actions",
        }
    }

    /// The backend key of a class node: `"<kind>/<ClassName>"`.
    pub fn class_key(&self, class_name: &str) -> String {
        format!("{}/{}", self.name(), class_name)
    }

    /// Split a backend class key back into kind and class name.
    pub fn parse_class_key(key: &str) -> Option<(Kind, &str)> {
        let (kind, class) = key.split_once('/')?;
        let kind = match kind {
            "thing" => Kind::Thing,
            "action" => Kind::Action,
            _ => return None,
        };
        Some((kind, class))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "thing" | "things" => Ok(Kind::Thing),
            "action" | "actions" => Ok(Kind::Action),
            _ => Err(format!("Invalid kind: {s}. Choose: thing, action")),
        }
    }
}

// ── Properties ────────────────────────────────────────────────────

/// The data type of a class property.
///
/// Serialized as a plain string: the primitive names (`string`, `int`,
/// `number`, `boolean`, `date`) or a capitalized class name for a
/// cross-reference to another class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    String,
    Int,
    Number,
    Boolean,
    Date,
    CrossRef(String),
}

impl DataType {
    pub fn is_reference(&self) -> bool {
        matches!(self, DataType::CrossRef(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            DataType::String => "string",
            DataType::Int => "int",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::CrossRef(class) => class,
        }
    }
}

impl TryFrom<String> for DataType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let primitive = match value.as_str() {
            "string" => Some(DataType::String),
            "int" => Some(DataType::Int),
            "number" => Some(DataType::Number),
            "boolean" => Some(DataType::Boolean),
            "date" => Some(DataType::Date),
            _ => None,
        };
        match primitive {
            Some(dt) => Ok(dt),
            None if value.starts_with(|c: char| c.is_ascii_uppercase()) => {
                Ok(DataType::CrossRef(value))
            }
            None => Err(format!("unknown data type '{value}'")),
        }
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single property definition on a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ── Classes ───────────────────────────────────────────────────────

/// A named schema type constraining which properties an entity may carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            class: name.into(),
            description: None,
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: &str, data_type: DataType, indexed: bool) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            data_type,
            indexed,
            description: None,
        });
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// The class list of one kind, plus its context and version markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticSchema {
    #[serde(rename = "@context", default)]
    pub context: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default)]
    pub classes: Vec<Class>,
}

impl SemanticSchema {
    pub fn class(&self, name: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.class == name)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut Class> {
        self.classes.iter_mut().find(|c| c.class == name)
    }
}

/// The complete logical schema: one class list per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub things: SemanticSchema,
    #[serde(default)]
    pub actions: SemanticSchema,
}

impl Schema {
    pub fn semantic_schema(&self, kind: Kind) -> &SemanticSchema {
        match kind {
            Kind::Thing => &self.things,
            Kind::Action => &self.actions,
        }
    }

    pub fn semantic_schema_mut(&mut self, kind: Kind) -> &mut SemanticSchema {
        match kind {
            Kind::Thing => &mut self.things,
            Kind::Action => &mut self.actions,
        }
    }

    pub fn class(&self, kind: Kind, name: &str) -> Option<&Class> {
        self.semantic_schema(kind).class(name)
    }

    /// True if a class of this name exists in either kind.
    pub fn class_exists(&self, name: &str) -> bool {
        self.things.class(name).is_some() || self.actions.class(name).is_some()
    }

    /// Remove a class by swapping the last class into its slot.
    ///
    /// Order among the remaining classes is not preserved.
    pub fn remove_class(&mut self, kind: Kind, name: &str) -> Option<Class> {
        let classes = &mut self.semantic_schema_mut(kind).classes;
        let idx = classes.iter().position(|c| c.class == name)?;
        Some(classes.swap_remove(idx))
    }
}

// ── Principal ─────────────────────────────────────────────────────

/// The authenticated subject issuing a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            groups: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city() -> Class {
        Class::new("City")
            .with_property("name", DataType::String, true)
            .with_property("population", DataType::Int, false)
            .with_property("inCountry", DataType::CrossRef("Country".into()), false)
    }

    #[test]
    fn data_type_serializes_as_plain_string() {
        let json = serde_json::to_string(&DataType::Number).unwrap();
        assert_eq!(json, "\"number\"");

        let json = serde_json::to_string(&DataType::CrossRef("Country".into())).unwrap();
        assert_eq!(json, "\"Country\"");

        let dt: DataType = serde_json::from_str("\"Country\"").unwrap();
        assert!(dt.is_reference());

        assert!(serde_json::from_str::<DataType>("\"float\"").is_err());
    }

    #[test]
    fn schema_document_field_names() {
        let mut schema = Schema::default();
        schema.things.context = "http://example.org".into();
        schema.things.classes.push(city());

        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["things"]["@context"], "http://example.org");
        assert_eq!(json["things"]["classes"][0]["class"], "City");
        assert_eq!(
            json["things"]["classes"][0]["properties"][0]["dataType"],
            "string"
        );
        assert_eq!(json["things"]["classes"][0]["properties"][0]["indexed"], true);

        let back: Schema = serde_json::from_value(json).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn remove_class_swaps_last_into_slot() {
        let mut schema = Schema::default();
        for name in ["A", "B", "C", "D"] {
            schema.things.classes.push(Class::new(name));
        }

        let removed = schema.remove_class(Kind::Thing, "B").unwrap();
        assert_eq!(removed.class, "B");

        let names: Vec<&str> = schema.things.classes.iter().map(|c| c.class.as_str()).collect();
        assert_eq!(names, vec!["A", "D", "C"]);

        assert!(schema.remove_class(Kind::Thing, "B").is_none());
        assert!(schema.remove_class(Kind::Action, "A").is_none());
    }

    #[test]
    fn class_keys_round_trip() {
        let key = Kind::Action.class_key("Flight");
        assert_eq!(key, "action/Flight");
        assert_eq!(Kind::parse_class_key(&key), Some((Kind::Action, "Flight")));
        assert_eq!(Kind::parse_class_key("person/Bob"), None);
    }

    #[test]
    fn kind_parses_singular_and_plural() {
        assert_eq!("things".parse::<Kind>().unwrap(), Kind::Thing);
        assert_eq!("Action".parse::<Kind>().unwrap(), Kind::Action);
        assert!("event".parse::<Kind>().is_err());
    }
}
