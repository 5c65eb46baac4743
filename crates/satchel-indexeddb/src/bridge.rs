//! The bridge: high-level calls forwarded to the native object store
//!
//! Async mirror of the core `RecordStore` contract — same method names,
//! same inputs, same outputs, same error semantics — plus database
//! management (open/enumerate/delete), index creation via version upgrade,
//! and explicit multi-store transactions.
//!
//! Records cross the JS boundary as JSON: `serde_json` on the Rust side,
//! `js_sys::JSON` on the platform side.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;
use wasm_bindgen::prelude::*;
use web_sys::{IdbDatabase, IdbObjectStore, IdbTransaction, IdbTransactionMode};

use satchel_core::schema::{DatabaseInfo, DatabaseSchema, IndexDefinition};

use crate::error::{IndexedDbError, Result};
use crate::idb;
use crate::registry::ConnectionRegistry;

/// Transaction mode for explicit transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

impl From<TransactionMode> for IdbTransactionMode {
    fn from(mode: TransactionMode) -> Self {
        match mode {
            TransactionMode::ReadOnly => IdbTransactionMode::Readonly,
            TransactionMode::ReadWrite => IdbTransactionMode::Readwrite,
        }
    }
}

/// Open connection to one named, versioned database.
///
/// Cloning shares the underlying connection object.
#[derive(Debug, Clone)]
pub struct Handle {
    name: String,
    db: IdbDatabase,
}

impl Handle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version currently stored by the platform.
    pub fn version(&self) -> u32 {
        self.db.version() as u32
    }

    /// Whether two handles wrap the same underlying connection object.
    pub fn is_same_connection(&self, other: &Handle) -> bool {
        js_sys::Object::is(self.db.as_ref(), other.db.as_ref())
    }

    pub(crate) fn db(&self) -> &IdbDatabase {
        &self.db
    }
}

/// Forwards high-level calls to the native object store.
///
/// Cheap to clone; clones share the injected connection registry and the
/// disposed flag. Disposal fails all further calls and closes the
/// registered connections; in-flight native requests are not cancelled
/// (the platform has no per-request cancellation).
#[derive(Debug, Clone)]
pub struct Bridge {
    registry: Rc<ConnectionRegistry>,
    disposed: Rc<Cell<bool>>,
}

impl Bridge {
    /// Create a bridge over a registry owned by the composition root.
    pub fn new(registry: Rc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            disposed: Rc::new(Cell::new(false)),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.get() {
            return Err(IndexedDbError::Disposed);
        }
        Ok(())
    }

    /// Open (or create) the schema's database.
    ///
    /// The registry caches one connection per database name; the upgrade
    /// callback runs iff `schema.version` exceeds the stored version.
    pub async fn open(&self, schema: &DatabaseSchema) -> Result<Handle> {
        self.ensure_live()?;
        let db = self.registry.open(schema).await?;
        Ok(Handle {
            name: schema.name.clone(),
            db,
        })
    }

    /// Enumerate databases as {name, version} pairs.
    pub async fn databases(&self) -> Result<Vec<DatabaseInfo>> {
        self.ensure_live()?;
        idb::list_databases().await
    }

    /// Delete a database by name, evicting its cached connection first
    /// (an open connection would block the delete).
    pub async fn delete_database(&self, name: &str) -> Result<()> {
        self.ensure_live()?;
        self.registry.evict(name);
        idb::delete_database(name).await
    }

    /// Insert a record. Fails with `Constraint` if the key, or a unique
    /// index value, is already present. Returns the record's key (the
    /// platform-assigned one when the store auto-increments).
    pub async fn add(&self, handle: &Handle, store: &str, record: &Value) -> Result<Value> {
        self.ensure_live()?;
        let js = json_to_js(record)?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readwrite)?;

        let req = object_store.add(&js).map_err(IndexedDbError::from)?;
        let key = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        js_to_json(&key)
    }

    /// Insert a batch in one readwrite transaction. A failed record aborts
    /// the transaction, so either every record lands or none does.
    /// Returns the keys in input order.
    pub async fn add_many(
        &self,
        handle: &Handle,
        store: &str,
        records: &[Value],
    ) -> Result<Vec<Value>> {
        self.ensure_live()?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readwrite)?;

        // Queue every request on the transaction before awaiting any of them.
        let mut requests = Vec::with_capacity(records.len());
        for record in records {
            let js = json_to_js(record)?;
            requests.push(object_store.add(&js).map_err(IndexedDbError::from)?);
        }

        let mut keys = Vec::with_capacity(requests.len());
        for req in &requests {
            keys.push(js_to_json(&idb::await_request(req).await?)?);
        }
        idb::await_transaction(&tx).await?;
        Ok(keys)
    }

    /// Retrieve a record by key. `None` is the not-found sentinel —
    /// absence is never an error.
    pub async fn get(&self, handle: &Handle, store: &str, key: &Value) -> Result<Option<Value>> {
        self.ensure_live()?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readonly)?;

        let req = object_store
            .get(&json_to_js(key)?)
            .map_err(IndexedDbError::from)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        js_to_json(&result).map(Some)
    }

    /// Retrieve every record in the store.
    pub async fn get_all(&self, handle: &Handle, store: &str) -> Result<Vec<Value>> {
        self.ensure_live()?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readonly)?;

        let req = object_store.get_all().map_err(IndexedDbError::from)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        js_array_to_json(&result)
    }

    /// Retrieve the records whose indexed field equals `query`, in the
    /// platform's index order.
    pub async fn get_all_by_index(
        &self,
        handle: &Handle,
        store: &str,
        index: &str,
        query: &Value,
    ) -> Result<Vec<Value>> {
        self.ensure_live()?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readonly)?;

        let index = object_store.index(index).map_err(IndexedDbError::from)?;
        let req = index
            .get_all_with_key(&json_to_js(query)?)
            .map_err(IndexedDbError::from)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        js_array_to_json(&result)
    }

    /// Insert or replace a record by its key.
    pub async fn put(&self, handle: &Handle, store: &str, record: &Value) -> Result<()> {
        self.ensure_live()?;
        let js = json_to_js(record)?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readwrite)?;

        let req = object_store.put(&js).map_err(IndexedDbError::from)?;
        idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(())
    }

    /// Delete a record by key.
    /// Returns `true` if a record was deleted, `false` if the key was absent.
    pub async fn delete(&self, handle: &Handle, store: &str, key: &Value) -> Result<bool> {
        self.ensure_live()?;
        if !self.contains(handle, store, key).await? {
            return Ok(false);
        }

        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readwrite)?;
        let req = object_store
            .delete(&json_to_js(key)?)
            .map_err(IndexedDbError::from)?;
        idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(true)
    }

    /// Whether a record exists under `key`.
    pub async fn contains(&self, handle: &Handle, store: &str, key: &Value) -> Result<bool> {
        self.ensure_live()?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readonly)?;

        let req = object_store
            .count_with_key(&json_to_js(key)?)
            .map_err(IndexedDbError::from)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        Ok(result.as_f64().unwrap_or(0.0) as u32 > 0)
    }

    /// Total number of records in the store.
    pub async fn count(&self, handle: &Handle, store: &str) -> Result<u32> {
        self.ensure_live()?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readonly)?;

        let req = object_store.count().map_err(IndexedDbError::from)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;

        Ok(result.as_f64().unwrap_or(0.0) as u32)
    }

    /// Remove every record from the store.
    pub async fn clear(&self, handle: &Handle, store: &str) -> Result<()> {
        self.ensure_live()?;
        let (tx, object_store) = self.store_txn(handle, store, IdbTransactionMode::Readwrite)?;

        let req = object_store.clear().map_err(IndexedDbError::from)?;
        idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(())
    }

    /// Declare a new index on a store.
    ///
    /// Index creation only applies inside a version upgrade, so this closes
    /// the cached connection and reopens at `schema.version + 1` with the
    /// index declared. Returns the new handle and the upgraded schema the
    /// caller should keep using.
    pub async fn create_index(
        &self,
        schema: &DatabaseSchema,
        store: &str,
        index: IndexDefinition,
    ) -> Result<(Handle, DatabaseSchema)> {
        self.ensure_live()?;
        let upgraded = schema
            .with_index(store, index)
            .map_err(|e| IndexedDbError::Upgrade(e.to_string()))?;

        self.registry.evict(&schema.name);
        let db = self.registry.open(&upgraded).await?;
        let handle = Handle {
            name: upgraded.name.clone(),
            db,
        };
        Ok((handle, upgraded))
    }

    /// Begin an explicit transaction over one or more stores.
    pub fn begin_transaction(
        &self,
        handle: &Handle,
        stores: &[&str],
        mode: TransactionMode,
    ) -> Result<Transaction> {
        self.ensure_live()?;
        let inner = idb::begin_transaction(handle.db(), stores, mode.into())?;
        Ok(Transaction { inner })
    }

    /// Prevent further calls through this bridge (and its clones) and close
    /// every registered connection.
    pub fn dispose(&self) {
        if !self.disposed.replace(true) {
            self.registry.close_all();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    fn store_txn(
        &self,
        handle: &Handle,
        store: &str,
        mode: IdbTransactionMode,
    ) -> Result<(IdbTransaction, IdbObjectStore)> {
        let tx = idb::begin_transaction(handle.db(), &[store], mode)?;
        let object_store = tx.object_store(store).map_err(IndexedDbError::from)?;
        Ok((tx, object_store))
    }
}

/// An explicit transaction over one or more stores.
///
/// Requests queue on the transaction; `commit` awaits the platform's
/// completion event (the observable commit point) and rejects if the
/// transaction aborted.
#[derive(Debug)]
pub struct Transaction {
    inner: IdbTransaction,
}

impl Transaction {
    fn object_store(&self, store: &str) -> Result<IdbObjectStore> {
        self.inner.object_store(store).map_err(IndexedDbError::from)
    }

    /// Insert a record through this transaction. Returns its key.
    pub async fn add(&self, store: &str, record: &Value) -> Result<Value> {
        let req = self
            .object_store(store)?
            .add(&json_to_js(record)?)
            .map_err(IndexedDbError::from)?;
        js_to_json(&idb::await_request(&req).await?)
    }

    /// Insert or replace a record through this transaction.
    pub async fn put(&self, store: &str, record: &Value) -> Result<()> {
        let req = self
            .object_store(store)?
            .put(&json_to_js(record)?)
            .map_err(IndexedDbError::from)?;
        idb::await_request(&req).await?;
        Ok(())
    }

    /// Retrieve a record by key through this transaction.
    pub async fn get(&self, store: &str, key: &Value) -> Result<Option<Value>> {
        let req = self
            .object_store(store)?
            .get(&json_to_js(key)?)
            .map_err(IndexedDbError::from)?;
        let result = idb::await_request(&req).await?;
        if result.is_undefined() || result.is_null() {
            return Ok(None);
        }
        js_to_json(&result).map(Some)
    }

    /// Delete a record by key through this transaction.
    pub async fn delete(&self, store: &str, key: &Value) -> Result<()> {
        let req = self
            .object_store(store)?
            .delete(&json_to_js(key)?)
            .map_err(IndexedDbError::from)?;
        idb::await_request(&req).await?;
        Ok(())
    }

    /// Await the transaction's completion. Rejects on error or abort.
    pub async fn commit(self) -> Result<()> {
        idb::await_transaction(&self.inner).await
    }

    /// Abort the transaction, rolling back its requests.
    pub fn abort(&self) -> Result<()> {
        self.inner.abort().map_err(IndexedDbError::from)
    }
}

// ============================================================================
// JSON <-> JS conversion
// ============================================================================

/// Convert a JSON record to a JS object for storage.
pub(crate) fn json_to_js(value: &Value) -> Result<JsValue> {
    let text = serde_json::to_string(value)?;
    js_sys::JSON::parse(&text)
        .map_err(|e| IndexedDbError::JsValue(format!("JSON parse: {:?}", e)))
}

/// Convert a JS value from the store back to JSON.
pub(crate) fn js_to_json(value: &JsValue) -> Result<Value> {
    let text: String = js_sys::JSON::stringify(value)
        .map_err(|e| IndexedDbError::JsValue(format!("JSON stringify: {:?}", e)))?
        .into();
    Ok(serde_json::from_str(&text)?)
}

/// Convert a JS array of records back to JSON values.
fn js_array_to_json(value: &JsValue) -> Result<Vec<Value>> {
    let array = js_sys::Array::from(value);
    let mut records = Vec::with_capacity(array.length() as usize);
    for i in 0..array.length() {
        records.push(js_to_json(&array.get(i))?);
    }
    Ok(records)
}
