//! TREEWIRE Protocol - Sync Layer
//!
//! Implements:
//! - The object-diff item vocabulary (`ADD`/`CHANGE`/`DELETE`/`NO_CHANGE`/
//!   `END_OF_OBJECT`) and its JSON shape
//! - Per-pass reference tables for shared sub-object deduplication
//! - The resumable send queue (tree to diff stream)
//! - The resumable receive queue (diff stream to tree, baseline reuse by
//!   reference)

mod message;
mod receive;
mod refs;
mod send;

pub use message::*;
pub use receive::*;
pub use refs::*;
pub use send::*;
