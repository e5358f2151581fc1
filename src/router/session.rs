//! Per-connection session state.
//!
//! Object tables are owned exclusively by their connection and passed
//! explicitly into every operation - never process-wide singletons - so
//! simultaneous connections cannot interfere. Object ids and everything
//! keyed by them are session-scoped, not durable.

use std::collections::HashMap;
use std::sync::Arc;

use crate::codec::CodecRegistry;
use crate::core::{OBJECT_ID_PREFIX, Value};

/// Connection-scoped object bookkeeping.
///
/// `local_objects` holds the authoritative live objects this peer can diff
/// and serve. `remote_objects` is the shadow cache: this peer's best
/// understanding of what the other side currently has materialized for each
/// id, used as the "before" baseline on the next diff in either direction.
#[derive(Debug)]
pub struct SessionContext {
    registry: Arc<CodecRegistry>,
    source_file_type: Option<String>,
    local_objects: HashMap<String, Value>,
    remote_objects: HashMap<String, Value>,
    next_id: u64,
}

impl SessionContext {
    /// Create a session over a codec registry.
    pub fn new(registry: Arc<CodecRegistry>) -> Self {
        Self {
            registry,
            source_file_type: None,
            local_objects: HashMap::new(),
            remote_objects: HashMap::new(),
            next_id: 0,
        }
    }

    /// Create a session whose codec lookups dispatch dynamically for the
    /// given source file type.
    pub fn with_source_file_type(
        registry: Arc<CodecRegistry>,
        source_file_type: impl Into<String>,
    ) -> Self {
        Self {
            source_file_type: Some(source_file_type.into()),
            ..Self::new(registry)
        }
    }

    /// The codec registry this session resolves kinds against.
    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    /// The dynamic-dispatch discriminator, if any.
    pub fn source_file_type(&self) -> Option<&str> {
        self.source_file_type.as_deref()
    }

    /// Issue a fresh session-scoped id with the given prefix.
    pub fn issue_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Register a new authoritative object, issuing it a fresh id.
    pub fn add_local_object(&mut self, value: Value) -> String {
        let id = self.issue_id(OBJECT_ID_PREFIX);
        self.local_objects.insert(id.clone(), value);
        id
    }

    /// Register or replace an authoritative object under a known id.
    pub fn put_local_object(&mut self, id: impl Into<String>, value: Value) {
        self.local_objects.insert(id.into(), value);
    }

    /// The authoritative object for an id, if this peer holds one.
    pub fn local_object(&self, id: &str) -> Option<&Value> {
        self.local_objects.get(id)
    }

    /// The shadow-cache entry for an id, if any.
    pub fn remote_object(&self, id: &str) -> Option<&Value> {
        self.remote_objects.get(id)
    }

    /// Advance the shadow cache: the other side now holds `value` for `id`.
    pub fn put_remote_object(&mut self, id: impl Into<String>, value: Value) {
        self.remote_objects.insert(id.into(), value);
    }

    /// Resolve an id against local objects first, then the shadow cache.
    pub fn resolve(&self, id: &str) -> Option<&Value> {
        self.local_objects
            .get(id)
            .or_else(|| self.remote_objects.get(id))
    }

    /// Forget an id everywhere; used when a diff stream ends in `DELETE`.
    pub fn evict(&mut self, id: &str) {
        self.local_objects.remove(id);
        self.remote_objects.remove(id);
    }
}
