//! Persistent entities and the `Store` collaborator boundary (spec.md §3, §5).

pub mod entities;
pub mod memory;
pub mod store;

pub use entities::*;
pub use memory::InMemoryStore;
pub use store::Store;
