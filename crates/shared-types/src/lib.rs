//! # Shared Types Crate
//!
//! This crate contains the group chain entities shared by block sync,
//! storage adapters and the node runtime.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Every cross-crate type is defined here.
//! - **Opaque Payloads**: Transactions carry application bytes the chain
//!   never interprets.
//! - **Producer Trust**: Only keys in the `ProducerPool` may author blocks.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
