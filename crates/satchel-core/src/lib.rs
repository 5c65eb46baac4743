//! satchel core
//!
//! Platform-neutral kernel for the satchel object-store bridge, designed to
//! compile identically for native (testing, tooling) and browser (WASM)
//! targets.
//!
//! - [`schema`] — store/database definitions and the compile-time `Model`
//!   contract that replaces runtime reflection
//! - [`storage`] — the `RecordStore` operation contract, error taxonomy,
//!   and the in-memory reference backend
//!
//! # Example
//!
//! ```rust
//! use satchel_core::schema::{FieldSpec, Model};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Contact {
//!     id: Option<u32>,
//!     name: String,
//! }
//!
//! impl Model for Contact {
//!     const STORE: &'static str = "contacts";
//!
//!     fn fields() -> &'static [FieldSpec] {
//!         const FIELDS: &[FieldSpec] = &[FieldSpec::auto_key("id"), FieldSpec::indexed("name")];
//!         FIELDS
//!     }
//! }
//!
//! let definition = Contact::definition().unwrap();
//! assert_eq!(definition.key_path, "id");
//! ```

pub mod schema;
pub mod storage;

// Re-export main types at crate root
pub use schema::{
    store_definition, DatabaseInfo, DatabaseSchema, FieldRole, FieldSpec, IndexDefinition, Model,
    SchemaError, StoreDefinition,
};
pub use storage::{MemoryStore, RecordStore, StoreError, StoreResult};
