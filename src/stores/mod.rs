//! Concrete store implementations. The real graph database and relational
//! analytics store are out of scope (§1); this module ships one in-process
//! reference implementation of each port, intended for tests, local
//! development, and as the template a production adapter is written
//! against — matching the teacher's `stores::sqlite::SqliteChunkStore`
//! relationship to `stores::Backend`.

pub mod memory;

pub use memory::{InMemoryAnalyticsStore, InMemoryGraphStore};
