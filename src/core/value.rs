//! The generic tree value model the protocol walks.
//!
//! Node shapes for any particular grammar live outside the core; the sync
//! layer only needs values with stable identity and codec-declared field
//! enumeration. Trees are immutable: a "mutation" builds new nodes along the
//! changed spine and shares every untouched subtree by `Arc`, which is what
//! makes identity diffing (and `NO_CHANGE` reuse on the receiving side)
//! meaningful.

use std::sync::Arc;

use serde_json::Value as JsonValue;

/// A scalar field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// Text.
    Str(String),
}

impl Scalar {
    /// Convert to the JSON payload carried in a diff item.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Scalar::Bool(b) => JsonValue::Bool(*b),
            Scalar::Int(i) => JsonValue::from(*i),
            Scalar::Float(f) => JsonValue::from(*f),
            Scalar::Str(s) => JsonValue::String(s.clone()),
        }
    }

    /// Convert from a JSON payload. Arrays, objects, and null are not
    /// scalars; those payload shapes mean something else on the wire.
    pub fn from_json(value: &JsonValue) -> Option<Scalar> {
        match value {
            JsonValue::Bool(b) => Some(Scalar::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Scalar::Int(i))
                } else {
                    n.as_f64().map(Scalar::Float)
                }
            }
            JsonValue::String(s) => Some(Scalar::Str(s.clone())),
            JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// One slot in a tree: nothing, a scalar, a node, or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent / cleared slot.
    Null,
    /// Scalar leaf.
    Scalar(Scalar),
    /// Structured node, shared by reference.
    Node(Arc<TreeNode>),
    /// Ordered list of values, shared by reference.
    List(Arc<Vec<Value>>),
}

impl Value {
    /// Build a scalar value.
    pub fn scalar(s: impl Into<Scalar>) -> Value {
        Value::Scalar(s.into())
    }

    /// Build a node value.
    pub fn node(node: TreeNode) -> Value {
        Value::Node(Arc::new(node))
    }

    /// Build a list value.
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Arc::new(items))
    }

    /// Whether this slot is empty.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Identity comparison: scalars by equality, structured values by
    /// pointer. Two structurally equal but distinct nodes are NOT the same
    /// identity - equal-looking nodes at different positions must remain
    /// independently mutable.
    pub fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The key this value diffs under when it sits in a list: the node's id
    /// when it has one, otherwise the slot index. Keyed diffing is what lets
    /// a middle insertion avoid re-encoding every later element.
    pub fn element_key(&self, index: usize) -> String {
        match self {
            Value::Node(node) => match &node.id {
                Some(id) => id.clone(),
                None => index.to_string(),
            },
            _ => index.to_string(),
        }
    }

    /// The node behind this value, if it is one.
    pub fn as_node(&self) -> Option<&Arc<TreeNode>> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }
}

/// A structured tree node: a kind discriminator plus ordered named fields.
///
/// `kind` selects the codec (and travels on the wire as `valueType`); the
/// codec - not this struct - decides which fields are sent and in what order.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Stable per-node id, when the producing parser assigns one. Used as
    /// the keyed-diff key for list elements and carried on the node's
    /// defining diff item.
    pub id: Option<String>,
    /// Kind discriminator, e.g. `"MethodDecl"`.
    pub kind: String,
    /// Named field values. Order here is storage order; wire order comes
    /// from the codec.
    pub fields: Vec<(String, Value)>,
}

impl TreeNode {
    /// Create a node without an id.
    pub fn new(kind: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            fields,
        }
    }

    /// Create a node with a stable id.
    pub fn with_id(
        id: impl Into<String>,
        kind: impl Into<String>,
        fields: Vec<(String, Value)>,
    ) -> Self {
        Self {
            id: Some(id.into()),
            kind: kind.into(),
            fields,
        }
    }

    /// Look up a field by name. Missing fields read as `Null`.
    pub fn field(&self, name: &str) -> Value {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .unwrap_or(Value::Null)
    }

    /// Copy of this node with one field replaced (added if absent). The
    /// returned node is a fresh identity; untouched field values keep theirs.
    pub fn with_field(&self, name: &str, value: Value) -> TreeNode {
        let mut node = self.clone();
        match node.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => node.fields.push((name.to_owned(), value)),
        }
        node
    }
}
