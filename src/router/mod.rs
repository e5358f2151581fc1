//! TREEWIRE Protocol - Router Layer
//!
//! Implements:
//! - Request/response message types for the RPC surface
//! - Per-connection session state (object tables, id issuance)
//! - The request router: `GetObject`, `Visit`, `Print`, `PrepareRecipe`,
//!   `GetCursor`
//! - Collaborator seams (visitors, printers, recipes, object sources)

mod requests;
mod router;
mod session;

pub use requests::*;
pub use router::*;
pub use session::*;
