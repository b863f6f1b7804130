//! Grid store for GridSync (`PostgreSQL` + in-memory).
//!
//! The grid store is the only durable state in the system: a map from
//! `(x, y)` to color with upsert and range-query operations. The live
//! mutation stream is never persisted.
//!
//! ```text
//! SyncService
//!     |
//!     +-- Arc<dyn GridStore>
//!         |-- PgGridStore      (cells table, pooled)
//!         +-- MemoryGridStore  (no database configured, tests)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The [`GridStore`] contract
//! - [`pg_store`] -- `PostgreSQL` implementation, pool setup, migrations
//! - [`memory`] -- In-memory implementation
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod pg_store;
pub mod store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use memory::MemoryGridStore;
pub use pg_store::{PgGridStore, PgSettings};
pub use store::GridStore;
