//! Cross-node integration tests.

pub mod multi_node;
pub mod scenarios;
