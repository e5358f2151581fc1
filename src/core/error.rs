//! Error types for the TREEWIRE protocol.

use thiserror::Error;

/// Convenience alias for results in the protocol core.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// The protocol error taxonomy.
///
/// Encode/decode errors fail only the in-flight request; the connection and
/// all other objects' state remain usable. There is no automatic retry in the
/// core - retry policy, if any, belongs to the transport layer above it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A diff stream broke the bracket/ordering contract.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// No codec registered for a kind (and source file type, if any).
    #[error("no codec registered for kind `{kind}`{}", source_file_type.as_deref().map(|t| format!(" (source file type `{t}`)")).unwrap_or_default())]
    UnknownCodec {
        /// The kind discriminator that failed to resolve.
        kind: String,
        /// The source file type used for dynamic dispatch, if any.
        source_file_type: Option<String>,
    },

    /// A back-reference was consumed before anything defined it in this pass.
    #[error("stale reference: ref {0} has no prior definition in this pass")]
    StaleReference(u32),

    /// An object id was not found where one is required.
    ///
    /// Note: `GetObject` never surfaces this - an unknown id there is a
    /// legitimate deletion and yields `[DELETE, END_OF_OBJECT]`.
    #[error("unknown object: {0}")]
    UnknownObject(String),

    /// A request exceeded its deadline. Treated as a transport-level failure;
    /// per-id state scoping keeps the rest of the connection consistent.
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before the deadline fired.
        elapsed_ms: u64,
    },

    /// An unprepared or unknown recipe/visitor name, or other setup problem.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ProtocolError {
    /// Shorthand for a bracket/ordering violation.
    pub fn violation(detail: impl Into<String>) -> Self {
        Self::ProtocolViolation(detail.into())
    }

    /// Shorthand for a missing codec.
    pub fn unknown_codec(kind: impl Into<String>, source_file_type: Option<&str>) -> Self {
        Self::UnknownCodec {
            kind: kind.into(),
            source_file_type: source_file_type.map(str::to_owned),
        }
    }
}
