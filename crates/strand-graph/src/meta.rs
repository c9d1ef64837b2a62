//! Meta-query building and meta result decoding.
//!
//! [`build_meta_query`] turns the requested analyses into one traversal
//! fragment that is appended to the per-class root traversal. It is a pure
//! function of its input.

use std::collections::BTreeMap;

use strand_core::{
    Class, MetaProperty, MetaResult, Occurrence, PropertyMap, PropertyMeta, PropertyValue,
    ScalarValue, StatisticalAnalysis,
};

use crate::tree::{ResultNode, Value};

/// How many entries a top-occurrences analysis returns.
pub const TOP_OCCURRENCES_LIMIT: usize = 3;

/// Build the traversal fragment for the requested analyses.
///
/// Returns an empty string when no property requests an analysis that needs
/// a traversal (`type` is answered from the schema).
pub fn build_meta_query(props: &[MetaProperty]) -> String {
    let per_prop: Vec<String> = props.iter().filter_map(property_query).collect();
    if per_prop.is_empty() {
        return String::new();
    }
    format!(".union({})", per_prop.join(", "))
}

fn property_query(prop: &MetaProperty) -> Option<String> {
    let name = escape(&prop.name);

    // Fixed order regardless of request order.
    let mut subs = Vec::new();
    if prop.wants(StatisticalAnalysis::Count) {
        subs.push(count_query(&name));
    }
    if prop.wants_top_occurrences() {
        subs.push(top_occurrences_query(&name));
    }
    if subs.is_empty() {
        return None;
    }

    Some(format!(
        "union({}).as(\"{name}\").project(\"{name}\").by(select(\"{name}\"))",
        subs.join(", ")
    ))
}

fn count_query(name: &str) -> String {
    format!(
        "has(\"{name}\").count().as(\"count\").project(\"count\").by(select(\"count\"))"
    )
}

fn top_occurrences_query(name: &str) -> String {
    format!(
        "groupCount().by(\"{name}\").order(local).by(values, decr).limit(local, {TOP_OCCURRENCES_LIMIT})\
         .as(\"topOccurrences\").project(\"topOccurrences\").by(select(\"topOccurrences\"))"
    )
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Shape a meta result tree into a [`MetaResult`].
///
/// The tree holds one node per analysed property, labeled with its name,
/// with a `count` child and a `topOccurrences` child whose children carry
/// `value`/`occurs`. `type` is filled from the class definition.
pub fn decode_meta(nodes: &[ResultNode], class: &Class, requests: &[MetaProperty]) -> MetaResult {
    let mut result = MetaResult::default();

    for req in requests {
        let mut meta = PropertyMeta::default();
        if req.wants(StatisticalAnalysis::Type) {
            meta.r#type = class
                .property(&req.name)
                .map(|p| p.data_type.as_str().to_string());
        }

        let node = nodes.iter().find(|n| n.attribute == req.name);
        if req.wants(StatisticalAnalysis::Count) {
            meta.count = Some(
                node.and_then(|n| n.child("count"))
                    .and_then(|c| c.prop("count"))
                    .and_then(Value::as_int)
                    .unwrap_or_default(),
            );
        }
        if req.wants_top_occurrences() {
            let occurrences = node
                .and_then(|n| n.child("topOccurrences"))
                .map(|top| {
                    top.children
                        .iter()
                        .filter_map(|o| {
                            Some(Occurrence {
                                value: value_string(o.prop("value")?),
                                occurs: o.prop("occurs").and_then(Value::as_int).unwrap_or_default(),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            meta.top_occurrences = Some(occurrences);
        }

        result.properties.insert(req.name.clone(), meta);
    }

    result
}

/// Compute the same analyses directly over a set of property maps.
///
/// Used by backends that cannot run traversal fragments. Ties in the top
/// occurrences are broken by value so the output is deterministic.
pub fn summarize(entities: &[PropertyMap], class: &Class, requests: &[MetaProperty]) -> MetaResult {
    let mut result = MetaResult::default();

    for req in requests {
        let mut meta = PropertyMeta::default();
        if req.wants(StatisticalAnalysis::Type) {
            meta.r#type = class
                .property(&req.name)
                .map(|p| p.data_type.as_str().to_string());
        }

        let values: Vec<String> = entities
            .iter()
            .filter_map(|e| e.get(&req.name))
            .map(property_string)
            .collect();

        if req.wants(StatisticalAnalysis::Count) {
            meta.count = Some(values.len() as i64);
        }
        if req.wants_top_occurrences() {
            let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
            for v in &values {
                *counts.entry(v.as_str()).or_default() += 1;
            }
            let mut ranked: Vec<(&str, i64)> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
            meta.top_occurrences = Some(
                ranked
                    .into_iter()
                    .take(TOP_OCCURRENCES_LIMIT)
                    .map(|(value, occurs)| Occurrence {
                        value: value.to_string(),
                        occurs,
                    })
                    .collect(),
            );
        }

        result.properties.insert(req.name.clone(), meta);
    }

    result
}

fn value_string(value: &Value) -> String {
    match value {
        Value::Str(s) | Value::Uid(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
    }
}

fn property_string(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Ref(id) => id.to_string(),
        PropertyValue::Value(ScalarValue::Str(s)) => s.clone(),
        PropertyValue::Value(ScalarValue::Int(i)) => i.to_string(),
        PropertyValue::Value(ScalarValue::Number(n)) => n.to_string(),
        PropertyValue::Value(ScalarValue::Bool(b)) => b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::DataType;
    use StatisticalAnalysis::*;

    fn strip(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn top_occurrences_value_only() {
        let query = build_meta_query(&[MetaProperty::new("name", &[TopOccurrencesValue])]);
        let expected = r#"
            .union(
                union(
                    groupCount().by("name")
                        .order(local).by(values, decr).limit(local, 3)
                        .as("topOccurrences").project("topOccurrences").by(select("topOccurrences"))
                )
                .as("name").project("name").by(select("name"))
            )
        "#;
        assert_eq!(strip(&query), strip(expected));
    }

    #[test]
    fn value_and_occurs_produce_one_fragment() {
        let both = build_meta_query(&[MetaProperty::new(
            "name",
            &[TopOccurrencesValue, TopOccurrencesOccurs],
        )]);
        let occurs_only = build_meta_query(&[MetaProperty::new("name", &[TopOccurrencesOccurs])]);
        let value_only = build_meta_query(&[MetaProperty::new("name", &[TopOccurrencesValue])]);
        assert_eq!(both, value_only);
        assert_eq!(occurs_only, value_only);
    }

    #[test]
    fn all_analyses_in_fixed_order() {
        let query = build_meta_query(&[MetaProperty::new(
            "name",
            &[TopOccurrencesOccurs, Type, TopOccurrencesValue, Count],
        )]);
        let expected = r#"
            .union(
                union(
                    has("name").count()
                        .as("count").project("count").by(select("count")),
                    groupCount().by("name")
                        .order(local).by(values, decr).limit(local, 3)
                        .as("topOccurrences").project("topOccurrences").by(select("topOccurrences"))
                )
                .as("name").project("name").by(select("name"))
            )
        "#;
        assert_eq!(strip(&query), strip(expected));
    }

    #[test]
    fn type_only_needs_no_traversal() {
        assert_eq!(build_meta_query(&[MetaProperty::new("name", &[Type])]), "");
        assert_eq!(build_meta_query(&[]), "");

        let query = build_meta_query(&[
            MetaProperty::new("name", &[Type]),
            MetaProperty::new("population", &[Count]),
        ]);
        assert!(!query.contains("\"name\""));
        assert!(query.contains("has(\"population\")"));
    }

    #[test]
    fn property_names_are_escaped() {
        let query = build_meta_query(&[MetaProperty::new("we\"ird", &[Count])]);
        assert!(query.contains(r#"has("we\"ird")"#));
    }

    #[test]
    fn decodes_meta_tree() {
        let class = Class::new("City").with_property("name", DataType::String, true);
        let tree = vec![ResultNode::new("name")
            .with_child(ResultNode::new("count").with_prop("count", Value::Int(4)))
            .with_child(
                ResultNode::new("topOccurrences")
                    .with_child(
                        ResultNode::new("occurrence")
                            .with_prop("value", Value::Str("Amsterdam".into()))
                            .with_prop("occurs", Value::Int(3)),
                    )
                    .with_child(
                        ResultNode::new("occurrence")
                            .with_prop("value", Value::Str("Berlin".into()))
                            .with_prop("occurs", Value::Int(1)),
                    ),
            )];

        let requests = [MetaProperty::new("name", &[Type, Count, TopOccurrencesValue])];
        let result = decode_meta(&tree, &class, &requests);
        let name = &result.properties["name"];
        assert_eq!(name.r#type.as_deref(), Some("string"));
        assert_eq!(name.count, Some(4));
        let top = name.top_occurrences.as_ref().unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].value, "Amsterdam");
        assert_eq!(top[0].occurs, 3);
    }

    #[test]
    fn summarize_ranks_and_limits() {
        let class = Class::new("City").with_property("name", DataType::String, false);
        let entities: Vec<PropertyMap> = ["a", "b", "b", "c", "c", "c", "d"]
            .iter()
            .map(|v| {
                let mut m = PropertyMap::new();
                m.insert("name".into(), PropertyValue::value(*v));
                m
            })
            .chain(std::iter::once(PropertyMap::new()))
            .collect();

        let result = summarize(
            &entities,
            &class,
            &[MetaProperty::new("name", &[Count, TopOccurrencesOccurs])],
        );
        let name = &result.properties["name"];
        assert_eq!(name.count, Some(7));
        assert!(name.r#type.is_none());
        let values: Vec<(&str, i64)> = name
            .top_occurrences
            .as_ref()
            .unwrap()
            .iter()
            .map(|o| (o.value.as_str(), o.occurs))
            .collect();
        assert_eq!(values, vec![("c", 3), ("b", 2), ("a", 1)]);
    }
}
