//! IndexedDB bridge for satchel (browser WASM)
//!
//! This crate exposes the browser's native object store to Rust through
//! futures: open/upgrade, add/get/put/delete, count, clear, index queries,
//! and explicit transactions. Because IndexedDB is callback-based, every
//! operation is async and settles exactly once.
//!
//! Connections are cached in a [`ConnectionRegistry`] owned by the
//! application's composition root: one cached handle per database name,
//! and a second open racing a pending one awaits the same native open.
//!
//! The typed [`Store`] facade binds one (database, store) pair to an
//! entity type implementing the `satchel_core::Model` contract.
//!
//! # Schema changes
//!
//! Stores and indexes are only created inside the version-upgrade
//! callback, which runs when a database is opened with a version higher
//! than the stored one. Declaring a new index therefore reopens the
//! database at `version + 1` — see `Bridge::create_index`.
//!
//! # Example
//!
//! ```rust,ignore
//! use satchel_core::schema::{store_definition, DatabaseSchema, FieldSpec};
//! use satchel_indexeddb::{Bridge, ConnectionRegistry};
//! use serde_json::json;
//!
//! let bridge = Bridge::new(ConnectionRegistry::shared());
//!
//! let schema = DatabaseSchema::new("app", 1).store(store_definition(
//!     "contacts",
//!     &[FieldSpec::key("id"), FieldSpec::indexed("name")],
//! )?);
//!
//! let db = bridge.open(&schema).await?;
//! bridge.add(&db, "contacts", &json!({"id": 1, "name": "Ada"})).await?;
//! let found = bridge.get(&db, "contacts", &json!(1)).await?;
//! assert!(found.is_some());
//! ```

pub mod bridge;
pub mod error;
pub mod idb;
pub mod registry;
pub mod store;

pub use bridge::{Bridge, Handle, Transaction, TransactionMode};
pub use error::{IndexedDbError, Result};
pub use registry::ConnectionRegistry;
pub use store::Store;
