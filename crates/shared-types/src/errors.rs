//! # Error Types
//!
//! Errors raised by `BlockStore` implementations.

use thiserror::Error;

/// Block storage failures.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Block not found in storage.
    #[error("Block not found: {0}")]
    NotFound(String),

    /// Parent block not committed, so a committed write has no height.
    #[error("Parent block not found: cannot commit block {block_id} on {parent_id}")]
    ParentNotFound {
        /// Block being written.
        block_id: String,
        /// Missing parent.
        parent_id: String,
    },
}
