//! Send queue: walks an "after" tree against a remembered "before" baseline
//! and lazily yields a diff stream.
//!
//! The walk is an explicit state machine (a stack of open frames: current
//! node, field index, list slot index) rather than a run-to-completion
//! function, so a caller can pull any batch size, suspend at the exact walk
//! position, and resume on the next pull. Abandoning a partially-pulled
//! queue is safe; the owner of the shadow cache advances the baseline only
//! once the trailing `END_OF_OBJECT` has actually been pulled.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::codec::CodecRegistry;
use crate::core::{Result, TreeNode, Value};

use super::message::{RpcObjectData, RpcObjectState};
use super::refs::SendRefs;

/// One suspended position in the depth-first walk.
#[derive(Debug)]
enum Frame {
    /// A pre-computed item to emit as-is.
    Emit(RpcObjectData),
    /// A value slot still to be diffed against its baseline.
    Value { after: Value, before: Value },
    /// An open node, walking codec-declared fields in wire order.
    Fields {
        after: Arc<TreeNode>,
        before: Option<Arc<TreeNode>>,
        names: Vec<String>,
        index: usize,
    },
    /// An open list, walking keyed slot pairs in after-order.
    Slots {
        pairs: Vec<(Value, Value)>,
        index: usize,
    },
    /// Close the innermost bracket.
    End,
}

/// Lazy, finite, resumable diff generator for one top-level object.
pub struct SendQueue {
    registry: Arc<CodecRegistry>,
    source_file_type: Option<String>,
    refs: SendRefs,
    stack: Vec<Frame>,
    failed: bool,
}

impl SendQueue {
    /// Diff `after` against `before` (the last baseline the peer is known
    /// to hold). A `Null` after is a deletion and yields exactly
    /// `[DELETE, END_OF_OBJECT]`.
    pub fn new(
        registry: Arc<CodecRegistry>,
        source_file_type: Option<String>,
        after: Value,
        before: Value,
    ) -> Self {
        let stack = if after.is_null() {
            vec![Frame::End, Frame::Emit(RpcObjectData::delete())]
        } else {
            vec![Frame::End, Frame::Value { after, before }]
        };
        Self {
            registry,
            source_file_type,
            refs: SendRefs::new(),
            stack,
            failed: false,
        }
    }

    /// Whether the walk ran to its trailing `END_OF_OBJECT`.
    pub fn is_complete(&self) -> bool {
        self.stack.is_empty() && !self.failed
    }

    /// Pull up to `batch_size` items, suspending at the exact walk position.
    pub fn take_batch(&mut self, batch_size: usize) -> Result<Vec<RpcObjectData>> {
        let mut batch = Vec::with_capacity(batch_size.min(64));
        while batch.len() < batch_size {
            match self.next_item() {
                Some(Ok(item)) => batch.push(item),
                Some(Err(err)) => return Err(err),
                None => break,
            }
        }
        trace!(
            items = batch.len(),
            complete = self.is_complete(),
            "pulled send batch"
        );
        Ok(batch)
    }

    /// Produce the next diff item, or `None` once the stream is exhausted.
    fn next_item(&mut self) -> Option<Result<RpcObjectData>> {
        loop {
            let frame = self.stack.pop()?;
            match frame {
                Frame::Emit(item) => return Some(Ok(item)),
                Frame::End => return Some(Ok(RpcObjectData::end_of_object())),
                Frame::Value { after, before } => match self.diff_value(after, before) {
                    Ok(item) => return Some(Ok(item)),
                    Err(err) => {
                        // A failed walk poisons only this stream.
                        self.failed = true;
                        self.stack.clear();
                        return Some(Err(err));
                    }
                },
                Frame::Fields {
                    after,
                    before,
                    names,
                    index,
                } => {
                    if index < names.len() {
                        let after_field = after.field(&names[index]);
                        let before_field = before
                            .as_ref()
                            .map(|b| b.field(&names[index]))
                            .unwrap_or(Value::Null);
                        self.stack.push(Frame::Fields {
                            after,
                            before,
                            names,
                            index: index + 1,
                        });
                        self.stack.push(Frame::Value {
                            after: after_field,
                            before: before_field,
                        });
                    }
                    // Exhausted field frames fall away; the End frame
                    // beneath them closes the bracket.
                }
                Frame::Slots { mut pairs, index } => {
                    if index < pairs.len() {
                        let (after, before) =
                            std::mem::replace(&mut pairs[index], (Value::Null, Value::Null));
                        self.stack.push(Frame::Slots {
                            pairs,
                            index: index + 1,
                        });
                        self.stack.push(Frame::Value { after, before });
                    }
                }
            }
        }
    }

    /// Emit the leading item for one slot, pushing frames for any nested
    /// stream it opens.
    fn diff_value(&mut self, after: Value, before: Value) -> Result<RpcObjectData> {
        if after.same_identity(&before) {
            return Ok(RpcObjectData::no_change());
        }
        if after.is_null() {
            return Ok(RpcObjectData::delete());
        }
        let state = if before.is_null() {
            RpcObjectState::Add
        } else {
            RpcObjectState::Change
        };

        // Nodes and lists both carry identity: the first occurrence defines
        // a ref id, every later one is a back-reference.
        if let Some((is_new, ref_id)) = self.refs.get_or_assign(&after) {
            if !is_new {
                return Ok(RpcObjectData::back_ref(state, ref_id));
            }
        }

        match after {
            Value::Null => unreachable!("handled above"),
            Value::Scalar(s) => Ok(RpcObjectData::scalar(state, s.to_json())),
            Value::Node(node) => {
                let codec = self
                    .registry
                    .lookup(&node.kind, self.source_file_type.as_deref())?;
                let names = codec.fields().to_vec();
                // Field baselines only make sense against the same kind; a
                // kind change re-encodes every field fresh.
                let before_node = before
                    .as_node()
                    .filter(|b| b.kind == node.kind)
                    .map(Arc::clone);
                let item = RpcObjectData::node(state, node.kind.clone(), node.id.clone());
                self.stack.push(Frame::End);
                self.stack.push(Frame::Fields {
                    after: node,
                    before: before_node,
                    names,
                    index: 0,
                });
                Ok(item)
            }
            Value::List(items) => {
                let before_map: HashMap<String, Value> = match &before {
                    Value::List(b) => b
                        .iter()
                        .enumerate()
                        .map(|(i, v)| (v.element_key(i), v.clone()))
                        .collect(),
                    _ => HashMap::new(),
                };
                let mut keys = Vec::with_capacity(items.len());
                let mut pairs = Vec::with_capacity(items.len());
                for (i, elem) in items.iter().enumerate() {
                    let key = elem.element_key(i);
                    let before_elem = before_map.get(&key).cloned().unwrap_or(Value::Null);
                    keys.push(key);
                    pairs.push((elem.clone(), before_elem));
                }
                self.stack.push(Frame::End);
                self.stack.push(Frame::Slots { pairs, index: 0 });
                Ok(RpcObjectData::list(state, keys))
            }
        }
    }
}

impl Iterator for SendQueue {
    type Item = Result<RpcObjectData>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_item()
    }
}

impl std::fmt::Debug for SendQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendQueue")
            .field("frames", &self.stack.len())
            .field("failed", &self.failed)
            .finish()
    }
}
