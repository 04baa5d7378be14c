//! Storage subsystem
//!
//! In-memory persistence for the demo server's accounts and messages. Nothing
//! here survives a restart.
//!
//! Components:
//! - `storage_trait`: the Storage trait defining a uniform API.
//! - `types`: user and message records.
//! - `memory_storage`: lock-protected `HashMap`/`Vec` implementation.

pub mod memory_storage;
pub mod storage_trait;
pub mod types;

pub use memory_storage::MemoryStorage;
pub use storage_trait::Storage;
