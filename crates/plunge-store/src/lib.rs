//! Persistence gateway implementations.
//!
//! [`SqliteStore`] is the durable backend used by the daemon; [`MemoryStore`]
//! keeps everything in process and counts writes, which the runtime tests use
//! to assert exactly which transitions touched storage.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
