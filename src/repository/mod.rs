//! Persistence layer: the [`Store`] contract and its implementations.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::Store;
