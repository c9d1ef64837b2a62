//! The recursive result tree returned by graph queries.
//!
//! A query block yields one [`ResultNode`] per matched node, labeled with the
//! block (or edge) name that reached it. Nesting mirrors the query shape.

/// A scalar value carried by a result node or written by a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// A backend node uid (`_uid_`).
    Uid(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Uid(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// One named scalar on a result node.
#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultNode {
    /// The block name or edge label that produced this node (e.g. `~id`, `type`).
    pub attribute: String,
    pub properties: Vec<Prop>,
    pub children: Vec<ResultNode>,
}

impl ResultNode {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            properties: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_prop(mut self, name: &str, value: Value) -> Self {
        self.properties.push(Prop {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn with_child(mut self, child: ResultNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// The node's `_uid_`, if the query asked for it.
    pub fn uid(&self) -> Option<&str> {
        self.prop("_uid_").and_then(Value::as_str)
    }

    pub fn children_labeled<'a>(&'a self, attribute: &'a str) -> impl Iterator<Item = &'a ResultNode> {
        self.children.iter().filter(move |c| c.attribute == attribute)
    }

    pub fn child(&self, attribute: &str) -> Option<&ResultNode> {
        self.children.iter().find(|c| c.attribute == attribute)
    }

    /// Depth-first search for the first property with this name.
    pub fn find_prop(&self, name: &str) -> Option<&Value> {
        self.prop(name)
            .or_else(|| self.children.iter().find_map(|c| c.find_prop(name)))
    }
}
