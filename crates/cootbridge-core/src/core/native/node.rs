use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A node of the engine's native object graph.
///
/// Scalar and value-array variants are copied by value when read from a parent, the way
/// plain value objects cross a native boundary. Every other variant lives behind a handle
/// that must be acquired before it can be inspected and released afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NativeNode {
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Fixed-size integer value array such as a triangle's `point_id`.
    Ints(Vec<i64>),
    /// Fixed-size float value array such as a vertex position or colour.
    Floats(Vec<f64>),
    /// Row-major matrix value, e.g. a 4x4 instance orientation.
    Matrix(Vec<Vec<f64>>),
    Vector(Vec<Rc<NativeNode>>),
    Map(Vec<(Rc<NativeNode>, Rc<NativeNode>)>),
    Pair(Rc<NativeNode>, Rc<NativeNode>),
    Object {
        class: String,
        fields: BTreeMap<String, Rc<NativeNode>>,
    },
}

impl NativeNode {
    /// The native class name, used in diagnostics and the heap journal.
    pub fn class_name(&self) -> &str {
        match self {
            NativeNode::Void => "void",
            NativeNode::Bool(_) => "bool",
            NativeNode::Int(_) => "int",
            NativeNode::Float(_) => "float",
            NativeNode::Str(_) => "string",
            NativeNode::Ints(_) => "int_values",
            NativeNode::Floats(_) => "float_values",
            NativeNode::Matrix(_) => "matrix",
            NativeNode::Vector(_) => "vector",
            NativeNode::Map(_) => "map",
            NativeNode::Pair(_, _) => "pair",
            NativeNode::Object { class, .. } => class,
        }
    }

    pub fn vector<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<NativeNode>,
    {
        NativeNode::Vector(items.into_iter().map(|item| Rc::new(item.into())).collect())
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<NativeNode>,
        V: Into<NativeNode>,
    {
        NativeNode::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Rc::new(k.into()), Rc::new(v.into())))
                .collect(),
        )
    }

    pub fn pair(first: impl Into<NativeNode>, second: impl Into<NativeNode>) -> Self {
        NativeNode::Pair(Rc::new(first.into()), Rc::new(second.into()))
    }

    pub fn object(class: impl Into<String>) -> ObjectBuilder {
        ObjectBuilder {
            class: class.into(),
            fields: BTreeMap::new(),
        }
    }
}

/// Incremental builder for [`NativeNode::Object`] values.
#[derive(Debug, Clone)]
pub struct ObjectBuilder {
    class: String,
    fields: BTreeMap<String, Rc<NativeNode>>,
}

impl ObjectBuilder {
    pub fn field(mut self, name: impl Into<String>, value: impl Into<NativeNode>) -> Self {
        self.fields.insert(name.into(), Rc::new(value.into()));
        self
    }

    pub fn build(self) -> NativeNode {
        NativeNode::Object {
            class: self.class,
            fields: self.fields,
        }
    }
}

impl From<ObjectBuilder> for NativeNode {
    fn from(builder: ObjectBuilder) -> Self {
        builder.build()
    }
}

impl From<bool> for NativeNode {
    fn from(value: bool) -> Self {
        NativeNode::Bool(value)
    }
}

impl From<i64> for NativeNode {
    fn from(value: i64) -> Self {
        NativeNode::Int(value)
    }
}

impl From<i32> for NativeNode {
    fn from(value: i32) -> Self {
        NativeNode::Int(value.into())
    }
}

impl From<f64> for NativeNode {
    fn from(value: f64) -> Self {
        NativeNode::Float(value)
    }
}

impl From<&str> for NativeNode {
    fn from(value: &str) -> Self {
        NativeNode::Str(value.to_string())
    }
}

impl From<String> for NativeNode {
    fn from(value: String) -> Self {
        NativeNode::Str(value)
    }
}

impl From<Vec<f64>> for NativeNode {
    fn from(value: Vec<f64>) -> Self {
        NativeNode::Floats(value)
    }
}

impl<const N: usize> From<[f64; N]> for NativeNode {
    fn from(value: [f64; N]) -> Self {
        NativeNode::Floats(value.to_vec())
    }
}

impl<const N: usize> From<[i64; N]> for NativeNode {
    fn from(value: [i64; N]) -> Self {
        NativeNode::Ints(value.to_vec())
    }
}

impl From<()> for NativeNode {
    fn from(_: ()) -> Self {
        NativeNode::Void
    }
}
