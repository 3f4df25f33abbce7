//! Test infrastructure for the OVN Northbound command layer
//!
//! Provides:
//! - An in-memory test environment with a ready API handle
//! - Fixtures for common topology and ACL patterns
//! - Topology verification helpers (membership, integrity, counts)

mod env;
pub mod fixtures;
mod verification;

pub use env::NbTestEnv;
pub use fixtures::*;
pub use verification::*;
