//! # Algorithms
//!
//! Block validation and traversals over storage.

pub mod chain_walk;
pub mod validation;

pub use chain_walk::{canonical_path, gather_connected, get_trimmed_blocks};
pub use validation::validate_block;
