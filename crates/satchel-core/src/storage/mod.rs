//! Storage abstraction for schema-less records
//!
//! This module defines the `RecordStore` trait that abstracts over object
//! store backends. Implementations exist for:
//!
//! - **Memory**: In-memory reference backend for testing (`MemoryStore`)
//! - **IndexedDB**: Browser storage (separate crate, WASM only, async mirror
//!   of this trait — same method names, same semantics)
//!
//! # Example
//!
//! ```rust
//! use satchel_core::schema::{store_definition, FieldSpec};
//! use satchel_core::storage::{MemoryStore, RecordStore};
//! use serde_json::json;
//!
//! let contacts = store_definition(
//!     "contacts",
//!     &[FieldSpec::key("id"), FieldSpec::indexed("name")],
//! )
//! .unwrap();
//!
//! let mut store = MemoryStore::new(vec![contacts]);
//! store.add("contacts", json!({"id": 1, "name": "A"})).unwrap();
//!
//! let found = store.get("contacts", &json!(1)).unwrap();
//! assert!(found.is_some());
//! ```

mod error;
mod memory;
mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::RecordStore;
