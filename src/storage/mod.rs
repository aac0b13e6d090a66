//! Storage backends
//!
//! - [`SqliteBackend`]: relational tables, one medium per table
//! - [`MemoryBackend`]: schemaless entities grouped by kind

pub mod memory;
pub mod schema;
pub mod sqlite;

pub use memory::{EntityMedium, MemoryBackend};
pub use sqlite::{SqliteBackend, TableMedium};
