//! TREEWIRE Protocol - Core Layer
//!
//! Leaf dependencies for everything else:
//! - Error taxonomy
//! - Protocol constants
//! - The generic tree value model (identity-bearing nodes, scalars, lists)
//! - Cursors (ancestor chains for visitors and printers)

mod constants;
mod cursor;
mod error;
mod value;

pub use constants::*;
pub use cursor::*;
pub use error::*;
pub use value::*;
