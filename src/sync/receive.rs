//! Receive queue: consumes a diff stream and reconstructs or mutates a tree,
//! reusing unchanged subtrees from the prior baseline by reference.
//!
//! The mirror image of the send queue: a push-driven state machine that
//! tolerates items arriving across any number of batched calls. Bracket
//! violations fail only this stream; the caller's other per-id state is
//! untouched.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::trace;

use crate::codec::CodecRegistry;
use crate::core::{ProtocolError, Result, Scalar, TreeNode, Value};

use super::message::{RpcObjectData, RpcObjectState};
use super::refs::ReceiveRefs;

/// One open position in the reconstruction.
#[derive(Debug)]
enum Frame {
    /// Expecting the leading item of a value slot.
    Value { before: Value },
    /// A node under construction; finalized by its `END_OF_OBJECT`.
    Node {
        kind: String,
        id: Option<String>,
        names: Vec<String>,
        before: Option<Arc<TreeNode>>,
        built: Vec<Value>,
        ref_id: u32,
    },
    /// A list under construction; baselines aligned per wire key.
    List {
        befores: Vec<Value>,
        built: Vec<Value>,
        ref_id: u32,
    },
}

/// Resumable consumer for one top-level object's diff stream.
pub struct ReceiveQueue {
    registry: Arc<CodecRegistry>,
    source_file_type: Option<String>,
    refs: ReceiveRefs,
    stack: Vec<Frame>,
    root: Option<Value>,
    awaiting_terminator: bool,
    finished: bool,
}

impl ReceiveQueue {
    /// Reconstruct against `before`, the baseline this side already holds
    /// for the object (`Null` on a first fetch).
    pub fn new(
        registry: Arc<CodecRegistry>,
        source_file_type: Option<String>,
        before: Value,
    ) -> Self {
        Self {
            registry,
            source_file_type,
            refs: ReceiveRefs::new(),
            stack: vec![Frame::Value { before }],
            root: None,
            awaiting_terminator: false,
            finished: false,
        }
    }

    /// Whether the trailing `END_OF_OBJECT` has been consumed.
    pub fn is_complete(&self) -> bool {
        self.finished
    }

    /// Feed one batch. Returns `Some(value)` once the stream terminator is
    /// consumed; a deleted object completes as `Value::Null`.
    pub fn apply(&mut self, items: &[RpcObjectData]) -> Result<Option<Value>> {
        // The reconstructed value is handed out exactly once.
        if self.finished {
            if items.is_empty() {
                return Ok(None);
            }
            return Err(ProtocolError::violation(
                "diff item after end of object stream",
            ));
        }
        for item in items {
            self.consume(item)?;
        }
        trace!(
            items = items.len(),
            complete = self.finished,
            "applied receive batch"
        );
        if self.finished {
            Ok(Some(self.root.take().unwrap_or(Value::Null)))
        } else {
            Ok(None)
        }
    }

    fn consume(&mut self, item: &RpcObjectData) -> Result<()> {
        if self.finished {
            return Err(ProtocolError::violation(
                "diff item after end of object stream",
            ));
        }
        if self.awaiting_terminator {
            if !item.is_end() {
                return Err(ProtocolError::violation(format!(
                    "expected stream terminator END_OF_OBJECT, got {:?}",
                    item.state
                )));
            }
            self.awaiting_terminator = false;
            self.finished = true;
            return Ok(());
        }

        match self.stack.pop() {
            None => Err(ProtocolError::violation(
                "diff item with no open bracket to receive it",
            )),
            Some(Frame::Value { before }) => self.open_value(item, before),
            Some(Frame::Node {
                kind,
                id,
                names,
                built,
                ref_id,
                ..
            }) => {
                if !item.is_end() {
                    return Err(ProtocolError::violation(format!(
                        "expected END_OF_OBJECT closing `{kind}`, got {:?}",
                        item.state
                    )));
                }
                let node = Arc::new(TreeNode {
                    id,
                    kind,
                    fields: names.into_iter().zip(built).collect(),
                });
                let value = Value::Node(node);
                self.refs.define(ref_id, value.clone());
                self.complete(value)
            }
            Some(Frame::List { built, ref_id, .. }) => {
                if !item.is_end() {
                    return Err(ProtocolError::violation(format!(
                        "expected END_OF_OBJECT closing list, got {:?}",
                        item.state
                    )));
                }
                let value = Value::List(Arc::new(built));
                self.refs.define(ref_id, value.clone());
                self.complete(value)
            }
        }
    }

    /// Handle the leading item of a value slot.
    fn open_value(&mut self, item: &RpcObjectData, before: Value) -> Result<()> {
        let state = item.state;
        match state {
            RpcObjectState::NoChange => return self.complete(before),
            RpcObjectState::Delete => return self.complete(Value::Null),
            RpcObjectState::EndOfObject => {
                return Err(ProtocolError::violation(
                    "END_OF_OBJECT in value position",
                ));
            }
            RpcObjectState::Add | RpcObjectState::Change => {}
        }

        // Per-slot monotonicity: ADD opens a slot with no baseline, CHANGE
        // replaces one that exists.
        if state == RpcObjectState::Change && before.is_null() {
            return Err(ProtocolError::violation("CHANGE without a baseline"));
        }
        if state == RpcObjectState::Add && !before.is_null() {
            return Err(ProtocolError::violation("ADD over an existing baseline"));
        }

        if let Some(reference) = item.reference {
            let value = self.refs.resolve(reference)?;
            return self.complete(value);
        }

        if let Some(kind) = &item.value_type {
            let codec = self
                .registry
                .lookup(kind, self.source_file_type.as_deref())?;
            let names = codec.fields().to_vec();
            let id = item
                .value
                .as_ref()
                .and_then(JsonValue::as_str)
                .map(str::to_owned);
            let before_node = before
                .as_node()
                .filter(|b| &b.kind == kind)
                .map(Arc::clone);
            let ref_id = self.refs.reserve();
            let first_before = names
                .first()
                .map(|name| {
                    before_node
                        .as_ref()
                        .map(|b| b.field(name))
                        .unwrap_or(Value::Null)
                });
            self.stack.push(Frame::Node {
                kind: kind.clone(),
                id,
                names,
                before: before_node,
                built: Vec::new(),
                ref_id,
            });
            if let Some(before_field) = first_before {
                self.stack.push(Frame::Value {
                    before: before_field,
                });
            }
            return Ok(());
        }

        match &item.value {
            Some(JsonValue::Array(raw_keys)) => {
                let mut keys = Vec::with_capacity(raw_keys.len());
                for key in raw_keys {
                    match key.as_str() {
                        Some(k) => keys.push(k.to_owned()),
                        None => {
                            return Err(ProtocolError::violation(
                                "non-string key in list key array",
                            ));
                        }
                    }
                }
                let before_map: HashMap<String, Value> = match &before {
                    Value::List(b) => b
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (v.element_key(i), v.clone()))
                        .collect(),
                    _ => HashMap::new(),
                };
                let befores: Vec<Value> = keys
                    .iter()
                    .map(|k| before_map.get(k).cloned().unwrap_or(Value::Null))
                    .collect();
                let first_before = befores.first().cloned();
                let ref_id = self.refs.reserve();
                self.stack.push(Frame::List {
                    befores,
                    built: Vec::new(),
                    ref_id,
                });
                if let Some(before_elem) = first_before {
                    self.stack.push(Frame::Value {
                        before: before_elem,
                    });
                }
                Ok(())
            }
            Some(payload) => match Scalar::from_json(payload) {
                Some(scalar) => self.complete(Value::Scalar(scalar)),
                None => Err(ProtocolError::violation(format!(
                    "unusable inline payload: {payload}"
                ))),
            },
            None => Err(ProtocolError::violation(format!(
                "{state:?} item with no payload, kind, or ref"
            ))),
        }
    }

    /// Attach a finished value to the enclosing frame, or mark the root done.
    fn complete(&mut self, value: Value) -> Result<()> {
        match self.stack.last_mut() {
            None => {
                self.root = Some(value);
                self.awaiting_terminator = true;
                Ok(())
            }
            Some(Frame::Node {
                names,
                before,
                built,
                ..
            }) => {
                built.push(value);
                if built.len() < names.len() {
                    let before_field = before
                        .as_ref()
                        .map(|b| b.field(&names[built.len()]))
                        .unwrap_or(Value::Null);
                    self.stack.push(Frame::Value {
                        before: before_field,
                    });
                }
                Ok(())
            }
            Some(Frame::List { befores, built, .. }) => {
                built.push(value);
                if built.len() < befores.len() {
                    let before_elem = befores[built.len()].clone();
                    self.stack.push(Frame::Value {
                        before: before_elem,
                    });
                }
                Ok(())
            }
            Some(Frame::Value { .. }) => Err(ProtocolError::violation(
                "completed a value into an unopened slot",
            )),
        }
    }
}

impl std::fmt::Debug for ReceiveQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveQueue")
            .field("frames", &self.stack.len())
            .field("finished", &self.finished)
            .finish()
    }
}
