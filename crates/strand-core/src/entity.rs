//! Entity instances (Things and Actions) and the request/response shapes
//! connectors return for them.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StrandError};

// ── Property values ───────────────────────────────────────────────

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Int(i64),
    Number(f64),
    Bool(bool),
    Str(String),
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Str(value.to_string())
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int(value)
    }
}

/// The value of one entity property: a scalar (`{"value": ...}`) or a
/// reference to another entity (`{"ref": "<uuid>"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyValue {
    Value(ScalarValue),
    Ref(Uuid),
}

impl PropertyValue {
    pub fn value(v: impl Into<ScalarValue>) -> Self {
        PropertyValue::Value(v.into())
    }
}

pub type PropertyMap = BTreeMap<String, PropertyValue>;

// ── Things ────────────────────────────────────────────────────────

/// A standalone object instance of a Thing class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thing {
    #[serde(rename = "@context", default)]
    pub context: String,
    #[serde(rename = "@class")]
    pub class: String,
    #[serde(default)]
    pub schema: PropertyMap,
    #[serde(default)]
    pub creation_time_ms: i64,
    #[serde(default)]
    pub last_seen_time_ms: i64,
    #[serde(default)]
    pub last_update_time_ms: i64,
    #[serde(default)]
    pub last_use_time_ms: i64,
}

impl Thing {
    /// A new thing with all four timestamps set to now.
    pub fn new(class: impl Into<String>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            context: String::new(),
            class: class.into(),
            schema: PropertyMap::new(),
            creation_time_ms: now,
            last_seen_time_ms: now,
            last_update_time_ms: now,
            last_use_time_ms: now,
        }
    }

    pub fn with_property(mut self, name: &str, value: PropertyValue) -> Self {
        self.schema.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThingGetResponse {
    pub thing_id: Uuid,
    #[serde(flatten)]
    pub thing: Thing,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThingsListResponse {
    pub things: Vec<ThingGetResponse>,
    pub total_results: i64,
}

// ── Actions ───────────────────────────────────────────────────────

/// An edge-with-payload: `subject` performs the action on the target thing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "@context", default)]
    pub context: String,
    #[serde(rename = "@class")]
    pub class: String,
    #[serde(default)]
    pub schema: PropertyMap,
    /// The target thing.
    pub thing_id: Uuid,
    pub subject_id: Uuid,
    #[serde(default)]
    pub creation_time_unix: i64,
    #[serde(default)]
    pub last_update_time_unix: i64,
}

impl Action {
    pub fn new(class: impl Into<String>, subject_id: Uuid, thing_id: Uuid) -> Self {
        let now = Utc::now().timestamp();
        Self {
            context: String::new(),
            class: class.into(),
            schema: PropertyMap::new(),
            thing_id,
            subject_id,
            creation_time_unix: now,
            last_update_time_unix: now,
        }
    }

    pub fn with_property(mut self, name: &str, value: PropertyValue) -> Self {
        self.schema.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGetResponse {
    pub action_id: Uuid,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionsListResponse {
    pub actions: Vec<ActionGetResponse>,
    pub total_results: i64,
}

// ── Pagination ────────────────────────────────────────────────────

/// A validated page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    limit: u32,
    page: u32,
}

impl Pagination {
    pub fn new(limit: u32, page: u32) -> Result<Self> {
        if limit == 0 {
            return Err(StrandError::ValidationFailed(
                "limit must be greater than 0".to_string(),
            ));
        }
        if page < 1 {
            return Err(StrandError::ValidationFailed(
                "page numbers start at 1".to_string(),
            ));
        }
        Ok(Self { limit, page })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Number of entities skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_values_use_value_and_ref_keys() {
        let json = serde_json::to_value(PropertyValue::value("Amsterdam")).unwrap();
        assert_eq!(json, serde_json::json!({"value": "Amsterdam"}));

        let id = Uuid::new_v4();
        let json = serde_json::to_value(PropertyValue::Ref(id)).unwrap();
        assert_eq!(json, serde_json::json!({"ref": id.to_string()}));

        let back: PropertyValue = serde_json::from_value(serde_json::json!({"value": 42})).unwrap();
        assert_eq!(back, PropertyValue::Value(ScalarValue::Int(42)));
    }

    #[test]
    fn thing_response_flattens_thing_fields() {
        let thing = Thing::new("City").with_property("name", PropertyValue::value("Utrecht"));
        let response = ThingGetResponse {
            thing_id: Uuid::new_v4(),
            thing,
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["@class"], "City");
        assert!(json["thingId"].is_string());
        assert!(json["creationTimeMs"].is_i64());
        assert_eq!(json["schema"]["name"]["value"], "Utrecht");
    }

    #[test]
    fn pagination_offsets() {
        assert_eq!(Pagination::new(10, 1).unwrap().offset(), 0);
        assert_eq!(Pagination::new(10, 2).unwrap().offset(), 10);
        assert_eq!(Pagination::new(25, 4).unwrap().offset(), 75);
    }

    #[test]
    fn pagination_rejects_invalid_requests() {
        assert!(matches!(
            Pagination::new(10, 0),
            Err(StrandError::ValidationFailed(_))
        ));
        assert!(matches!(
            Pagination::new(0, 1),
            Err(StrandError::ValidationFailed(_))
        ));
    }
}
