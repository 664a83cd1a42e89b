//! # Group-Chain Test Suite
//!
//! Unified test crate for scenarios that span several nodes on the
//! in-process network.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # TestGroup: keys, genesis, producer pool, node joins
//! └── integration/
//!     ├── scenarios.rs  # Forward gap, orphan backward, fork choice, stop
//!     └── multi_node.rs # Several producers/followers, epoch batches, failures
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p gc-tests
//! cargo test -p gc-tests integration::scenarios::
//! ```

pub mod harness;
pub mod integration;
