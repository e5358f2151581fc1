//! Diff stream item types.
//!
//! A diff stream is a fully bracketed, depth-first, pre-order sequence of
//! `RpcObjectData` items. Encoding rules:
//!
//! - `ADD`/`CHANGE` for a scalar field carry the value inline.
//! - `ADD`/`CHANGE` for a node carry `valueType` (the kind) and are followed
//!   by the node's own field stream, terminated by its own `END_OF_OBJECT`.
//!   The defining item also carries the node's stable id, when it has one,
//!   as its inline value. A back-reference to an already-sent node or list
//!   carries `ref` instead and opens no nested stream.
//! - `ADD`/`CHANGE` for a list carry the per-element keys as a JSON array,
//!   followed by one value stream per key, then `END_OF_OBJECT`. Removal is
//!   a key's absence; keyed diffing keeps a middle insertion from
//!   re-encoding every later element.
//! - `DELETE` and `NO_CHANGE` never carry a payload and never open a
//!   nested stream.
//!
//! A top-level fetch stream is one value stream plus a trailing
//! `END_OF_OBJECT` terminator, which is how an unknown id yields exactly
//! `[DELETE, END_OF_OBJECT]`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Per-slot diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcObjectState {
    /// Fresh value for a slot with no baseline.
    Add,
    /// Replacement for a slot that had a baseline.
    Change,
    /// Clear the slot; the id/key disappears from bookkeeping.
    Delete,
    /// The baseline slot is correct; reuse it by reference, do not rebuild.
    NoChange,
    /// Close the innermost open bracket.
    EndOfObject,
}

/// One item of a diff stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcObjectData {
    /// The operation for this slot.
    pub state: RpcObjectState,

    /// Kind discriminator for a node's defining item; disambiguates
    /// polymorphic fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    /// Inline payload: a scalar, a list's key array, or a node's stable id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,

    /// Back-reference to a previously-sent node in this pass.
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<u32>,
}

impl RpcObjectData {
    /// Item with a state and no payload (`DELETE`, `NO_CHANGE`).
    pub fn bare(state: RpcObjectState) -> Self {
        Self {
            state,
            value_type: None,
            value: None,
            reference: None,
        }
    }

    /// `ADD`/`CHANGE` with an inline scalar payload.
    pub fn scalar(state: RpcObjectState, value: JsonValue) -> Self {
        Self {
            state,
            value_type: None,
            value: Some(value),
            reference: None,
        }
    }

    /// Defining item for a node: kind plus optional stable id.
    pub fn node(state: RpcObjectState, kind: impl Into<String>, id: Option<String>) -> Self {
        Self {
            state,
            value_type: Some(kind.into()),
            value: id.map(JsonValue::String),
            reference: None,
        }
    }

    /// Opening item for a list: the per-element keys in after-order.
    pub fn list(state: RpcObjectState, keys: Vec<String>) -> Self {
        Self {
            state,
            value_type: None,
            value: Some(JsonValue::Array(
                keys.into_iter().map(JsonValue::String).collect(),
            )),
            reference: None,
        }
    }

    /// Back-reference item.
    pub fn back_ref(state: RpcObjectState, reference: u32) -> Self {
        Self {
            state,
            value_type: None,
            value: None,
            reference: Some(reference),
        }
    }

    /// The `NO_CHANGE` item.
    pub fn no_change() -> Self {
        Self::bare(RpcObjectState::NoChange)
    }

    /// The `DELETE` item.
    pub fn delete() -> Self {
        Self::bare(RpcObjectState::Delete)
    }

    /// The `END_OF_OBJECT` item.
    pub fn end_of_object() -> Self {
        Self::bare(RpcObjectState::EndOfObject)
    }

    /// Whether this item closes a bracket.
    pub fn is_end(&self) -> bool {
        self.state == RpcObjectState::EndOfObject
    }
}
