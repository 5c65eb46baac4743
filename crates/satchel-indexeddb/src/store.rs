//! Typed store facade
//!
//! Binds one (database, store) pair to an entity type implementing the
//! compile-time [`Model`] contract. Methods are async equivalents of the
//! core `RecordStore` operations — same names, same semantics — with
//! entities serialized through serde and errors surfaced in the
//! caller-facing `StoreError` taxonomy.
//!
//! # Example
//!
//! ```rust,ignore
//! use satchel_core::schema::{FieldSpec, Model};
//! use satchel_indexeddb::{Bridge, ConnectionRegistry, Store};
//!
//! let bridge = Bridge::new(ConnectionRegistry::shared());
//! let contacts: Store<Contact> = Store::open(bridge, "app", 1).await?;
//!
//! contacts.add(&Contact { id: None, name: "Ada".into(), city: "London".into() }).await?;
//! let in_london = contacts.get_all_by_index("city", "London").await?;
//! ```

use std::marker::PhantomData;

use serde_json::Value;

use satchel_core::schema::{lookup_path, DatabaseSchema, IndexDefinition, Model, StoreDefinition};
use satchel_core::{StoreError, StoreResult};

use crate::bridge::{Bridge, Handle};

/// Typed facade over one object store of one database.
pub struct Store<T: Model> {
    bridge: Bridge,
    handle: Handle,
    schema: DatabaseSchema,
    definition: StoreDefinition,
    _entity: PhantomData<T>,
}

// Manual impl: `T` itself need not be Clone.
impl<T: Model> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
            handle: self.handle.clone(),
            schema: self.schema.clone(),
            definition: self.definition.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Model> Store<T> {
    /// Open (or create) `database` at `version`, declaring `T`'s store.
    pub async fn open(bridge: Bridge, database: &str, version: u32) -> StoreResult<Self> {
        let definition = T::definition().map_err(|e| StoreError::InvalidArgument(e.to_string()))?;
        let schema = DatabaseSchema::new(database, version).store(definition.clone());
        let handle = bridge.open(&schema).await.map_err(StoreError::from)?;
        Ok(Self {
            bridge,
            handle,
            schema,
            definition,
            _entity: PhantomData,
        })
    }

    /// Bind to an already-open handle of a schema carrying several stores.
    ///
    /// Fails if the schema does not declare `T`'s store.
    pub fn attach(bridge: Bridge, handle: Handle, schema: DatabaseSchema) -> StoreResult<Self> {
        let definition = schema
            .store_definition(T::STORE)
            .cloned()
            .ok_or_else(|| {
                StoreError::InvalidArgument(format!("schema declares no store '{}'", T::STORE))
            })?;
        Ok(Self {
            bridge,
            handle,
            schema,
            definition,
            _entity: PhantomData,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn definition(&self) -> &StoreDefinition {
        &self.definition
    }

    /// Insert an entity. Returns its key (the platform-assigned one when
    /// the store auto-increments).
    pub async fn add(&self, item: &T) -> StoreResult<Value> {
        let mut record = self.to_record(item)?;
        self.prepare_insert(&mut record)?;
        self.bridge
            .add(&self.handle, &self.definition.name, &record)
            .await
            .map_err(StoreError::from)
    }

    /// Insert a batch in one transaction; either every entity lands or
    /// none does. Returns the keys in input order.
    pub async fn add_many(&self, items: &[T]) -> StoreResult<Vec<Value>> {
        let mut records = Vec::with_capacity(items.len());
        for item in items {
            let mut record = self.to_record(item)?;
            self.prepare_insert(&mut record)?;
            records.push(record);
        }
        self.bridge
            .add_many(&self.handle, &self.definition.name, &records)
            .await
            .map_err(StoreError::from)
    }

    /// Retrieve an entity by key. `None` is the not-found sentinel.
    pub async fn get_one(&self, key: impl Into<Value>) -> StoreResult<Option<T>> {
        let record = self
            .bridge
            .get(&self.handle, &self.definition.name, &key.into())
            .await
            .map_err(StoreError::from)?;
        record.map(from_record).transpose()
    }

    /// Retrieve every entity in the store.
    pub async fn get_all(&self) -> StoreResult<Vec<T>> {
        let records = self
            .bridge
            .get_all(&self.handle, &self.definition.name)
            .await
            .map_err(StoreError::from)?;
        records.into_iter().map(from_record).collect()
    }

    /// Retrieve the entities whose indexed field equals `query`.
    ///
    /// Fails with `InvalidArgument` if the model declares no such index.
    pub async fn get_all_by_index(
        &self,
        index: &str,
        query: impl Into<Value>,
    ) -> StoreResult<Vec<T>> {
        if self.definition.index(index).is_none() {
            return Err(StoreError::InvalidArgument(format!(
                "store '{}' declares no index '{}'",
                self.definition.name, index
            )));
        }
        let records = self
            .bridge
            .get_all_by_index(&self.handle, &self.definition.name, index, &query.into())
            .await
            .map_err(StoreError::from)?;
        records.into_iter().map(from_record).collect()
    }

    /// Insert or replace an entity by its key. The key field must be
    /// present even on auto-increment stores — updating an entity without
    /// a key would silently insert a new one.
    pub async fn update(&self, item: &T) -> StoreResult<()> {
        let record = self.to_record(item)?;
        self.require_key(&record)?;
        self.bridge
            .put(&self.handle, &self.definition.name, &record)
            .await
            .map_err(StoreError::from)
    }

    /// Delete an entity by key.
    /// Returns `true` if one was deleted, `false` if the key was absent.
    pub async fn delete(&self, key: impl Into<Value>) -> StoreResult<bool> {
        self.bridge
            .delete(&self.handle, &self.definition.name, &key.into())
            .await
            .map_err(StoreError::from)
    }

    /// Total number of entities in the store.
    pub async fn count(&self) -> StoreResult<u32> {
        self.bridge
            .count(&self.handle, &self.definition.name)
            .await
            .map_err(StoreError::from)
    }

    /// Remove every entity from the store.
    pub async fn clear(&self) -> StoreResult<()> {
        self.bridge
            .clear(&self.handle, &self.definition.name)
            .await
            .map_err(StoreError::from)
    }

    /// Declare a new index: reopens the database at `version + 1` with the
    /// index in the upgrade schema, replacing this facade's handle.
    pub async fn create_index(&mut self, index: IndexDefinition) -> StoreResult<()> {
        let (handle, schema) = self
            .bridge
            .create_index(&self.schema, &self.definition.name, index)
            .await
            .map_err(StoreError::from)?;
        self.definition = schema
            .store_definition(&self.definition.name)
            .cloned()
            .ok_or_else(|| StoreError::Upgrade("upgraded schema lost its store".to_string()))?;
        self.schema = schema;
        self.handle = handle;
        Ok(())
    }

    fn to_record(&self, item: &T) -> StoreResult<Value> {
        let record =
            serde_json::to_value(item).map_err(|e| StoreError::Serialization(e.to_string()))?;
        if !record.is_object() {
            return Err(StoreError::InvalidArgument(
                "entity must serialize to a JSON object".to_string(),
            ));
        }
        Ok(record)
    }

    /// On insert, the key field may only be absent when the store
    /// auto-increments. Serde serializes a `None` key field as JSON null,
    /// which the platform rejects as a key, so a null key is stripped and
    /// the platform assigns one.
    fn prepare_insert(&self, record: &mut Value) -> StoreResult<()> {
        if !self.definition.auto_increment {
            return self.require_key(record);
        }
        let key_path = &self.definition.key_path;
        if !key_path.contains('.')
            && matches!(lookup_path(record, key_path), Some(Value::Null))
        {
            if let Some(map) = record.as_object_mut() {
                map.remove(key_path);
            }
        }
        Ok(())
    }

    fn require_key(&self, record: &Value) -> StoreResult<()> {
        match lookup_path(record, &self.definition.key_path) {
            Some(key) if !key.is_null() => Ok(()),
            _ => Err(StoreError::InvalidArgument(format!(
                "entity is missing key field '{}'",
                self.definition.key_path
            ))),
        }
    }
}

fn from_record<T: Model>(record: Value) -> StoreResult<T> {
    serde_json::from_value(record).map_err(|e| StoreError::Serialization(e.to_string()))
}
