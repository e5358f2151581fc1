//! # TREEWIRE Protocol
//!
//! **T**ree **R**emote **E**dit **E**xchange over a **WIRE**
//!
//! TREEWIRE is a tree synchronization RPC protocol. It lets two independent
//! processes share and mutate one logical source tree over a narrow message
//! channel while staying referentially consistent. It provides:
//!
//! - **Diff streams**: Trees cross the wire as flat, bracketed streams of
//!   diff items against the peer's last-known baseline, never as whole
//!   serialized trees
//! - **Identity**: Unchanged sub-objects are reported by reference and the
//!   receiver reuses its existing instances, so pointer identity survives a
//!   round trip
//! - **Deduplication**: A sub-object shared at several positions is encoded
//!   once per pass; later occurrences are back-references
//! - **Resumability**: Both queues suspend between batches mid-stream, so
//!   arbitrarily large trees move in bounded batches with no semantic
//!   difference from a single pull
//!
//! ## Modules
//!
//! - [`core`]: Values, tree nodes, cursors, constants, and error types
//! - [`codec`]: Per-kind field schemas and their registry
//! - [`sync`]: The diff-item vocabulary and the send/receive queues
//! - [`router`]: The request surface (`GetObject`, `Visit`, `Print`,
//!   `PrepareRecipe`, `GetCursor`) and session state
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use treewire::prelude::*;
//!
//! // Describe the tree shapes both sides agree on.
//! let mut registry = CodecRegistry::new();
//! registry.register(FieldCodec::new("Pair", &["left", "right"]));
//! let registry = Arc::new(registry);
//!
//! // The owner diffs its tree against what the peer last saw (nothing).
//! let tree = Value::node(TreeNode::new(
//!     "Pair",
//!     vec![
//!         ("left".into(), Value::scalar(1i64)),
//!         ("right".into(), Value::scalar(2i64)),
//!     ],
//! ));
//! let mut send = SendQueue::new(Arc::clone(&registry), None, tree, Value::Null);
//!
//! // The peer reconstructs from the stream, batch by batch.
//! let mut receive = ReceiveQueue::new(registry, None, Value::Null);
//! let mut result = None;
//! while !send.is_complete() {
//!     let batch = send.take_batch(10)?;
//!     if let Some(value) = receive.apply(&batch)? {
//!         result = Some(value);
//!     }
//! }
//! assert!(result.is_some());
//! # Ok::<(), treewire::ProtocolError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod core;
pub mod router;
pub mod sync;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::codec::{Codec, CodecRegistry, FieldCodec};
    pub use crate::core::*;
    pub use crate::router::{
        ObjectSource, Recipe, RequestRouter, RouterConfig, RpcRequest, RpcResponse,
        SessionContext, TreePrinter, TreeVisitor,
    };
    pub use crate::sync::{ReceiveQueue, RpcObjectData, RpcObjectState, SendQueue};
}

// Re-export commonly used items at crate root
pub use crate::core::{Cursor, ProtocolError, Result, Scalar, TreeNode, Value};
pub use crate::sync::{ReceiveQueue, RpcObjectData, RpcObjectState, SendQueue};
