//! Architectural register identifiers.

/// General-purpose register index model.
pub mod registers;

pub use registers::{GeneralRegister, GENERAL_REGISTER_COUNT};
