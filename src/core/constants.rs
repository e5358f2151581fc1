//! Protocol constants.
//!
//! Field order and these values are part of the wire contract; changing them
//! without a protocol version bump breaks interop.

/// Protocol version (v1).
pub const PROTOCOL_VERSION: u16 = 0x0001;

/// Default number of diff items returned per `GetObject` pull.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// First reference id handed out by a reference table.
///
/// Ids are assigned in first-seen order during a single pass, starting here.
pub const FIRST_REF_ID: u32 = 1;

/// Prefix for object ids issued by a session.
pub const OBJECT_ID_PREFIX: &str = "obj";

/// Prefix for visitor ids issued by `PrepareRecipe`.
pub const VISITOR_ID_PREFIX: &str = "visitor";
