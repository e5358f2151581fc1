//! Request and response message types.
//!
//! The request surface built on the sync core: object fetch, remote visit,
//! remote print, remote recipe preparation, and cursor reconstruction. These
//! are plain serde structures; the transport that frames and delivers them
//! is out of scope.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::sync::RpcObjectData;

/// A router request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RpcRequest {
    /// Pull the next batch of one object's diff stream.
    GetObject {
        /// The object id to fetch.
        id: String,
        /// Items per batch; the router default when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        batch_size: Option<usize>,
    },

    /// Run a visitor against a tree and report whether it changed.
    Visit {
        /// Registered visitor kind (or a visitor id from `PrepareRecipe`).
        visitor: String,
        /// Visitor options, passed through opaquely.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<JsonValue>,
        /// The tree to visit.
        tree_id: String,
        /// Optional parameter object.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        param_id: Option<String>,
        /// Ancestor ids, root-most first.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor_ids: Option<Vec<String>>,
    },

    /// Print a tree back to text.
    Print {
        /// The tree to print.
        tree_id: String,
        /// Ancestor ids, root-most first.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor_ids: Option<Vec<String>>,
    },

    /// Instantiate a named, options-bound recipe on the responding side.
    PrepareRecipe {
        /// Recipe name.
        name: String,
        /// Recipe options.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        options: Option<JsonValue>,
    },

    /// Rebuild an ancestor chain from ids, root-most first.
    GetCursor {
        /// Ancestor ids, root-most first.
        cursor_ids: Vec<String>,
    },
}

/// A router response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RpcResponse {
    /// One batch of a `GetObject` stream.
    Batch(Vec<RpcObjectData>),
    /// Outcome of a `Visit`.
    Visit(VisitResponse),
    /// Printed text.
    Print(String),
    /// Handles to a prepared recipe.
    PrepareRecipe(PrepareRecipeResponse),
    /// The normalized ancestor chain a `GetCursor` resolved, root-most
    /// first. The chain itself lives on the responding side; across the
    /// wire a cursor is only ever its id list.
    Cursor(Vec<String>),
}

/// Result of a `Visit`: whether the tree's identity changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitResponse {
    /// True when the visitor produced a different tree.
    pub modified: bool,
}

/// Handles returned by `PrepareRecipe`, for later `Visit` calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRecipeResponse {
    /// Opaque id of the prepared recipe instance.
    pub id: String,
    /// The recipe's self-description.
    pub descriptor: JsonValue,
    /// Visitor id for the recipe's edit phase.
    pub edit_visitor_id: String,
    /// Visitor id for the recipe's scan phase, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_visitor_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = RpcRequest::GetObject {
            id: "obj-1".into(),
            batch_size: None,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded, json!({"method": "getObject", "id": "obj-1"}));
    }

    #[test]
    fn test_visit_request_roundtrip() {
        let request = RpcRequest::Visit {
            visitor: "rename-variable".into(),
            options: Some(json!({"from": "a", "to": "b"})),
            tree_id: "obj-1".into(),
            param_id: None,
            cursor_ids: Some(vec!["obj-0".into(), "obj-1".into()]),
        };
        let wire = serde_json::to_string(&request).unwrap();
        let decoded: RpcRequest = serde_json::from_str(&wire).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_prepare_recipe_response_omits_absent_scan_visitor() {
        let response = PrepareRecipeResponse {
            id: "recipe-1".into(),
            descriptor: json!({"name": "cleanup"}),
            edit_visitor_id: "visitor-2".into(),
            scan_visitor_id: None,
        };
        let encoded = serde_json::to_value(&response).unwrap();
        assert!(encoded.get("scanVisitorId").is_none());
        assert_eq!(encoded["editVisitorId"], json!("visitor-2"));
    }
}
