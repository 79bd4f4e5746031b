//! Storage abstraction and implementations for coursetrack.
//!
//! This crate provides a trait-based storage interface with an in-memory
//! backend, a JSON-file backend and an optional SQLite backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod retry;
#[cfg(feature = "json")]
pub mod json_storage;
#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

pub use trait_::{Storage, StorageError, Result, SubmissionUpsert};
pub use memory::MemoryStorage;
pub use retry::read_with_retry;
#[cfg(feature = "json")]
pub use json_storage::JsonStorage;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteStorage;
