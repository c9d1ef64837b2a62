//! Mutation sets and predicate declarations.
//!
//! A [`MutationSet`] batches every edge write and deletion for one logical
//! operation so the backend applies them in a single request. Deletions are
//! applied before writes within the same set.

use std::fmt;

use crate::tree::Value;

/// A node referenced by a mutation: an existing node by uid, or a blank node
/// created by the mutation itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Uid(String),
    Blank(String),
}

impl NodeRef {
    pub fn uid(uid: impl Into<String>) -> Self {
        NodeRef::Uid(uid.into())
    }

    pub fn blank(name: impl Into<String>) -> Self {
        NodeRef::Blank(name.into())
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Uid(uid) => write!(f, "<{uid}>"),
            NodeRef::Blank(name) => write!(f, "_:{name}"),
        }
    }
}

/// The object of an edge: a scalar value or another node.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Value(Value),
    Node(NodeRef),
}

/// `subject -predicate-> object`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub subject: NodeRef,
    pub predicate: String,
    pub object: Object,
}

/// A wildcard or exact deletion.
#[derive(Debug, Clone, PartialEq)]
pub enum Deletion {
    /// `<s> * *`: every predicate of the node.
    Node(NodeRef),
    /// `<s> <p> *`: every value of one predicate.
    Predicate { subject: NodeRef, predicate: String },
    /// `<s> <p> <o>`: one edge.
    Edge(Edge),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationSet {
    pub set: Vec<Edge>,
    pub delete: Vec<Deletion>,
}

impl MutationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.delete.is_empty()
    }

    pub fn set_value(&mut self, subject: &NodeRef, predicate: &str, value: Value) {
        self.set.push(Edge {
            subject: subject.clone(),
            predicate: predicate.to_string(),
            object: Object::Value(value),
        });
    }

    pub fn connect(&mut self, from: &NodeRef, predicate: &str, to: &NodeRef) {
        self.set.push(Edge {
            subject: from.clone(),
            predicate: predicate.to_string(),
            object: Object::Node(to.clone()),
        });
    }

    pub fn delete_node(&mut self, subject: &NodeRef) {
        self.delete.push(Deletion::Node(subject.clone()));
    }

    pub fn delete_predicate(&mut self, subject: &NodeRef, predicate: &str) {
        self.delete.push(Deletion::Predicate {
            subject: subject.clone(),
            predicate: predicate.to_string(),
        });
    }

    pub fn disconnect(&mut self, from: &NodeRef, predicate: &str, to: &NodeRef) {
        self.delete.push(Deletion::Edge(Edge {
            subject: from.clone(),
            predicate: predicate.to_string(),
            object: Object::Node(to.clone()),
        }));
    }

    /// Render the writes as N-Quads, one edge per line.
    pub fn set_nquads(&self) -> String {
        self.set.iter().map(|e| format!("{} .\n", edge_nquad(e))).collect()
    }

    /// Render the deletions as N-Quads, one deletion per line.
    pub fn delete_nquads(&self) -> String {
        self.delete
            .iter()
            .map(|d| match d {
                Deletion::Node(s) => format!("{s} * * .\n"),
                Deletion::Predicate { subject, predicate } => {
                    format!("{subject} <{predicate}> * .\n")
                }
                Deletion::Edge(e) => format!("{} .\n", edge_nquad(e)),
            })
            .collect()
    }
}

fn edge_nquad(edge: &Edge) -> String {
    let object = match &edge.object {
        Object::Node(n) => n.to_string(),
        Object::Value(v) => literal(v),
    };
    format!("{} <{}> {}", edge.subject, edge.predicate, object)
}

fn literal(value: &Value) -> String {
    match value {
        Value::Str(s) => format!("\"{}\"", escape(s)),
        Value::Int(i) => format!("\"{i}\"^^<xs:int>"),
        Value::Float(f) => format!("\"{f}\"^^<xs:float>"),
        Value::Bool(b) => format!("\"{b}\"^^<xs:boolean>"),
        Value::Uid(uid) => format!("<{uid}>"),
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

// ── Predicate declarations ───────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    Uid,
}

impl ValueType {
    fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::Uid => "uid",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    None,
    Index,
    Reverse,
}

/// Declaration of one backend predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUpdate {
    pub predicate: String,
    pub value_type: ValueType,
    pub directive: Directive,
    pub tokenizers: Vec<String>,
    pub count: bool,
}

impl SchemaUpdate {
    pub fn indexed(predicate: &str, value_type: ValueType, tokenizers: &[&str]) -> Self {
        Self {
            predicate: predicate.to_string(),
            value_type,
            directive: Directive::Index,
            tokenizers: tokenizers.iter().map(|t| (*t).to_string()).collect(),
            count: false,
        }
    }

    /// Also maintain a count index.
    pub fn counted(mut self) -> Self {
        self.count = true;
        self
    }

    pub fn reverse(predicate: &str) -> Self {
        Self {
            predicate: predicate.to_string(),
            value_type: ValueType::Uid,
            directive: Directive::Reverse,
            tokenizers: Vec::new(),
            count: true,
        }
    }

    pub fn plain(predicate: &str, value_type: ValueType) -> Self {
        Self {
            predicate: predicate.to_string(),
            value_type,
            directive: Directive::None,
            tokenizers: Vec::new(),
            count: false,
        }
    }

    /// Render as a schema line, e.g. `class: string @index(exact, term) @count .`
    pub fn to_schema_line(&self) -> String {
        let mut line = format!("{}: {}", self.predicate, self.value_type.as_str());
        match self.directive {
            Directive::Index => {
                line.push_str(&format!(" @index({})", self.tokenizers.join(", ")));
            }
            Directive::Reverse => line.push_str(" @reverse"),
            Directive::None => {}
        }
        if self.count {
            line.push_str(" @count");
        }
        line.push_str(" .");
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_set_nquads() {
        let entity = NodeRef::blank("entity");
        let class = NodeRef::uid("0x2a");

        let mut m = MutationSet::new();
        m.connect(&entity, "type", &class);
        m.set_value(&entity, "name", Value::Str("Say \"hi\"".into()));
        m.set_value(&entity, "creationTimeMs", Value::Int(1700000000000));

        assert_eq!(
            m.set_nquads(),
            "_:entity <type> <0x2a> .\n\
             _:entity <name> \"Say \\\"hi\\\"\" .\n\
             _:entity <creationTimeMs> \"1700000000000\"^^<xs:int> .\n"
        );
    }

    #[test]
    fn renders_wildcard_deletions() {
        let mut m = MutationSet::new();
        m.delete_node(&NodeRef::uid("0x1"));
        m.delete_predicate(&NodeRef::uid("0x2"), "name");

        assert_eq!(m.delete_nquads(), "<0x1> * * .\n<0x2> <name> * .\n");
        assert!(m.set.is_empty());
        assert!(!m.is_empty());
    }

    #[test]
    fn schema_lines() {
        assert_eq!(
            SchemaUpdate::indexed("class", ValueType::String, &["exact", "term"])
                .counted()
                .to_schema_line(),
            "class: string @index(exact, term) @count ."
        );
        assert_eq!(
            SchemaUpdate::reverse("action.of").to_schema_line(),
            "action.of: uid @reverse @count ."
        );
        assert_eq!(
            SchemaUpdate::plain("atContext", ValueType::String).to_schema_line(),
            "atContext: string ."
        );
        assert_eq!(
            SchemaUpdate::indexed("creationTimeMs", ValueType::Int, &["int"]).to_schema_line(),
            "creationTimeMs: int @index(int) ."
        );
    }
}
