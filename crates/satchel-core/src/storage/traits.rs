//! Record-store trait definitions

use serde_json::Value;

use crate::storage::error::StoreResult;

/// Core object-store operations over schema-less JSON records.
///
/// This trait defines the operation set every backend carries. It is
/// synchronous; the browser backend provides async equivalents with the
/// same method names, inputs, outputs, and error semantics.
///
/// Records are JSON objects. Each store declares a key path; a record must
/// contain that field unless the store auto-increments, in which case the
/// backend assigns the key and reports it back.
pub trait RecordStore {
    /// Insert a record.
    ///
    /// Fails with `StoreError::Constraint` if the key, or a unique index
    /// value, is already present. Returns the record's key (the assigned
    /// one when the store auto-increments).
    fn add(&mut self, store: &str, record: Value) -> StoreResult<Value>;

    /// Insert a batch of records atomically: either every record lands or
    /// none does. Returns the keys in input order.
    fn add_many(&mut self, store: &str, records: Vec<Value>) -> StoreResult<Vec<Value>>;

    /// Retrieve a record by key.
    ///
    /// `None` is the not-found sentinel — absence is never an error.
    fn get(&self, store: &str, key: &Value) -> StoreResult<Option<Value>>;

    /// Retrieve every record in the store.
    fn get_all(&self, store: &str) -> StoreResult<Vec<Value>>;

    /// Retrieve the records whose indexed field equals `query`, in
    /// implementation-defined order.
    fn get_all_by_index(&self, store: &str, index: &str, query: &Value) -> StoreResult<Vec<Value>>;

    /// Insert or replace a record by its key.
    fn put(&mut self, store: &str, record: Value) -> StoreResult<()>;

    /// Delete a record by key.
    ///
    /// Returns `true` if a record was deleted, `false` if the key was absent.
    fn delete(&mut self, store: &str, key: &Value) -> StoreResult<bool>;

    /// Total number of records in the store.
    fn count(&self, store: &str) -> StoreResult<u32>;

    /// Remove every record from the store.
    fn clear(&mut self, store: &str) -> StoreResult<()>;
}
