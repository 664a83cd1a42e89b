//! # Group-Chain Node Runtime
//!
//! Wiring for a group-chain node: configuration, node assembly on the
//! in-process network, and the producer/follower demo.
//!
//! ## Module Structure
//!
//! ```text
//! node-runtime/
//! ├── config.rs     # NodeConfig + GC_* overrides
//! ├── node.rs       # GroupNode: chain + inbox pump
//! └── runtime.rs    # NodeRuntime: producer/follower demo
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod node;
pub mod runtime;

pub use config::{ConfigError, NodeConfig};
pub use node::{GroupNode, NodeParams};
pub use runtime::{DemoReport, NodeRuntime};
