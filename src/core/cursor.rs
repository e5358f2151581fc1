//! Ancestor context for visitors and printers.
//!
//! A cursor is an immutable singly-linked chain from a value up to the root.
//! Cross-process it travels as an ordered list of object ids, root-most
//! first, and is relinked on arrival by resolving each id against the
//! session's object tables.

use std::sync::Arc;

use super::value::Value;

/// One link in an ancestor chain.
#[derive(Debug, Clone)]
pub struct Cursor {
    /// The value at this position.
    value: Value,
    /// The enclosing position, `None` at the root.
    parent: Option<Arc<Cursor>>,
}

impl Cursor {
    /// A root cursor with no parent.
    pub fn root(value: Value) -> Self {
        Self {
            value,
            parent: None,
        }
    }

    /// A cursor nested under `parent`.
    pub fn new(value: Value, parent: Arc<Cursor>) -> Self {
        Self {
            value,
            parent: Some(parent),
        }
    }

    /// The value at this position.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The enclosing cursor, if any.
    pub fn parent(&self) -> Option<&Arc<Cursor>> {
        self.parent.as_ref()
    }

    /// Number of links in the chain, the root included.
    pub fn depth(&self) -> usize {
        self.ancestry().count()
    }

    /// Iterate from this position up to the root.
    pub fn ancestry(&self) -> Ancestry<'_> {
        Ancestry {
            current: Some(self),
        }
    }

    /// Build a chain from values ordered root-most first.
    ///
    /// Returns `None` for an empty path.
    pub fn from_path(values: impl IntoIterator<Item = Value>) -> Option<Cursor> {
        let mut cursor: Option<Cursor> = None;
        for value in values {
            cursor = Some(match cursor {
                None => Cursor::root(value),
                Some(parent) => Cursor::new(value, Arc::new(parent)),
            });
        }
        cursor
    }
}

/// Iterator over a cursor chain, innermost first.
#[derive(Debug)]
pub struct Ancestry<'a> {
    current: Option<&'a Cursor>,
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = &'a Cursor;

    fn next(&mut self) -> Option<Self::Item> {
        let cursor = self.current?;
        self.current = cursor.parent.as_deref();
        Some(cursor)
    }
}
