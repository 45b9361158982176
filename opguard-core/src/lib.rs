//! # opguard-core
//!
//! The exclusive-operation lease kernel for guarded ERP records.
//! Provides precondition-checked lease acquisition with conflict
//! detection, TTL expiry, and atomic redemption of the guarded
//! mutation (ledger entry + aggregate update + status transition).

pub mod error;
pub mod executor;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod manager;
pub mod registry;
pub mod types;

#[cfg(test)]
mod manager_test;
#[cfg(test)]
#[path = "infrastructure_test.rs"]
mod infrastructure_test;
