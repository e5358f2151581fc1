//! Reference tables for shared sub-object deduplication.
//!
//! Keyed by identity, not structural equality: two structurally equal but
//! distinct values get distinct ref ids, because equal-looking values at
//! different positions must remain independently mutable. A table lives for
//! one top-level send/receive pass and is then discarded - identity sharing
//! is only meaningful within one consistent walk.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{FIRST_REF_ID, ProtocolError, Result, Value};

/// The address key for an identity-bearing value. Scalars and `Null` diff by
/// equality and are never deduplicated.
fn identity_key(value: &Value) -> Option<usize> {
    match value {
        Value::Node(node) => Some(Arc::as_ptr(node) as usize),
        Value::List(items) => Some(Arc::as_ptr(items) as usize),
        Value::Null | Value::Scalar(_) => None,
    }
}

/// Send-side table: value identity to ref id, assigned in first-seen order.
///
/// Both identity-bearing shapes go through here - a list shared at several
/// positions is encoded once and back-referenced afterwards, exactly like a
/// shared node.
#[derive(Debug, Default)]
pub struct SendRefs {
    ids: HashMap<usize, u32>,
    // Keeps every keyed value alive so an address is never reused mid-pass.
    pinned: Vec<Value>,
}

impl SendRefs {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return this value's ref id, assigning the next one on first sight.
    /// `None` for scalars and `Null`, which carry no identity.
    ///
    /// The id is assigned before the caller recurses into children, so a
    /// value that reaches itself again resolves to a back-reference rather
    /// than infinite recursion.
    pub fn get_or_assign(&mut self, value: &Value) -> Option<(bool, u32)> {
        let key = identity_key(value)?;
        if let Some(id) = self.ids.get(&key) {
            return Some((false, *id));
        }
        let id = FIRST_REF_ID + self.ids.len() as u32;
        self.ids.insert(key, id);
        self.pinned.push(value.clone());
        Some((true, id))
    }
}

/// Receive-side table: ref id to reconstructed value.
///
/// Ids are reserved in the same first-seen order the sender assigned them:
/// one slot per defining item consumed, filled once the value's bracket
/// closes. Resolving an unreserved or unfilled slot is a stale reference.
#[derive(Debug, Default)]
pub struct ReceiveRefs {
    slots: Vec<Option<Value>>,
}

impl ReceiveRefs {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next ref id for a node or list whose stream just opened.
    pub fn reserve(&mut self) -> u32 {
        self.slots.push(None);
        FIRST_REF_ID + (self.slots.len() - 1) as u32
    }

    /// Fill a reserved slot with the finished value.
    pub fn define(&mut self, id: u32, value: Value) {
        let index = (id - FIRST_REF_ID) as usize;
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(value);
        }
    }

    /// Resolve a back-reference.
    pub fn resolve(&self, id: u32) -> Result<Value> {
        id.checked_sub(FIRST_REF_ID)
            .and_then(|index| self.slots.get(index as usize))
            .and_then(|slot| slot.clone())
            .ok_or(ProtocolError::StaleReference(id))
    }
}
