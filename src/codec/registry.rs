//! Codec trait and registry.
//!
//! A codec is written once per node kind and enumerates exactly the fields
//! to send, in a fixed order both peers must agree on byte-for-byte. Order
//! is part of the protocol, not an implementation detail.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{ProtocolError, Result};

/// Deterministic field enumeration for one node kind.
pub trait Codec: std::fmt::Debug + Send + Sync {
    /// The kind discriminator this codec serves (wire `valueType`).
    fn kind(&self) -> &str;

    /// Field names in wire order.
    fn fields(&self) -> &[String];
}

/// The common table-driven codec: a kind plus an ordered field list.
#[derive(Debug, Clone)]
pub struct FieldCodec {
    kind: String,
    fields: Vec<String>,
}

impl FieldCodec {
    /// Create a codec for `kind` sending `fields` in the given order.
    pub fn new(kind: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            kind: kind.into(),
            fields: fields.iter().map(|f| (*f).to_owned()).collect(),
        }
    }
}

impl Codec for FieldCodec {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// A dynamic-dispatch entry: a kind predicate plus the codec it selects.
struct DynamicEntry {
    matches: Box<dyn Fn(&str) -> bool + Send + Sync>,
    codec: Arc<dyn Codec>,
}

/// Maps a node's kind (and, for polymorphic trees, its source file type) to
/// the codec that knows its field order.
///
/// Dynamic entries support trees whose concrete node set varies per embedded
/// source language: lookup matches first on the `source_file_type`
/// discriminator, then takes the first entry whose predicate accepts the
/// kind. First match wins, so entries for a given source file type must be
/// registered most-specific-first.
#[derive(Default)]
pub struct CodecRegistry {
    by_kind: HashMap<String, Arc<dyn Codec>>,
    dynamic: HashMap<String, Vec<DynamicEntry>>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec under its own kind. Replaces any previous codec for
    /// that kind.
    pub fn register(&mut self, codec: impl Codec + 'static) {
        let codec: Arc<dyn Codec> = Arc::new(codec);
        self.by_kind.insert(codec.kind().to_owned(), codec);
    }

    /// Register a dynamic-dispatch codec for `source_file_type`. Entries are
    /// consulted in registration order; register most-specific-first.
    pub fn register_dynamic(
        &mut self,
        source_file_type: impl Into<String>,
        matches: impl Fn(&str) -> bool + Send + Sync + 'static,
        codec: impl Codec + 'static,
    ) {
        self.dynamic
            .entry(source_file_type.into())
            .or_default()
            .push(DynamicEntry {
                matches: Box::new(matches),
                codec: Arc::new(codec),
            });
    }

    /// Resolve the codec for `kind`, consulting the dynamic entries for
    /// `source_file_type` first when one is given, then the exact-kind table.
    pub fn lookup(&self, kind: &str, source_file_type: Option<&str>) -> Result<&Arc<dyn Codec>> {
        if let Some(entries) = source_file_type.and_then(|sft| self.dynamic.get(sft)) {
            if let Some(entry) = entries.iter().find(|e| (e.matches)(kind)) {
                return Ok(&entry.codec);
            }
        }

        self.by_kind
            .get(kind)
            .ok_or_else(|| ProtocolError::unknown_codec(kind, source_file_type))
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("kinds", &self.by_kind.len())
            .field("dynamic_types", &self.dynamic.len())
            .finish()
    }
}
