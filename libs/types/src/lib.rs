//! Types library for the fleet tracking system
//!
//! This library provides the core type definitions shared by the fleet
//! synchronization engine and anything that consumes its state.
//!
//! # Modules
//! - `ids`: Identifiers (EntityId, SessionId)
//! - `position`: Position and trajectory value types
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod position;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::position::*;
    pub use crate::errors::*;
}
