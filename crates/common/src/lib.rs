//! Shared building blocks for the notes workspace: logging setup, wire types
//! and environment lookups.

pub mod env;
pub mod types;
pub mod utils;
