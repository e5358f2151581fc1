//! TREEWIRE Protocol - Codec Layer
//!
//! Implements:
//! - The `Codec` field-enumeration contract (wire field order per node kind)
//! - The codec registry with exact-kind and dynamic (per source file type)
//!   dispatch, resolved most-specific-first

mod registry;

pub use registry::*;
