//! In-memory storage backend
//!
//! A HashMap-based implementation for testing and development. Not suitable
//! for production use due to lack of persistence, but it enforces the same
//! contract as the browser backend: key-path extraction, auto-increment
//! assignment, unique-index constraints, and index equality queries.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

use crate::schema::{lookup_path, DatabaseSchema, StoreDefinition};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::traits::RecordStore;

/// In-memory record store.
///
/// Stores records per object store, keyed by the canonical JSON form of
/// their key. Useful for:
/// - Unit testing
/// - Development/prototyping
/// - Exercising schema semantics without a browser
#[derive(Debug, Default)]
pub struct MemoryStore {
    stores: HashMap<String, StoreState>,
}

#[derive(Debug)]
struct StoreState {
    definition: StoreDefinition,
    // Key generator; the platform's starts at 1 and survives clear().
    next_key: u64,
    records: BTreeMap<String, Value>,
}

impl MemoryStore {
    /// Create a memory store with the given store definitions.
    pub fn new(stores: Vec<StoreDefinition>) -> Self {
        let stores = stores
            .into_iter()
            .map(|definition| {
                (
                    definition.name.clone(),
                    StoreState {
                        definition,
                        next_key: 1,
                        records: BTreeMap::new(),
                    },
                )
            })
            .collect();
        Self { stores }
    }

    /// Create a memory store declaring every store of a database schema.
    pub fn from_schema(schema: &DatabaseSchema) -> Self {
        Self::new(schema.stores.clone())
    }

    fn state(&self, store: &str) -> StoreResult<&StoreState> {
        self.stores
            .get(store)
            .ok_or_else(|| StoreError::Backend(format!("no object store '{store}'")))
    }

    fn state_mut(&mut self, store: &str) -> StoreResult<&mut StoreState> {
        self.stores
            .get_mut(store)
            .ok_or_else(|| StoreError::Backend(format!("no object store '{store}'")))
    }
}

impl RecordStore for MemoryStore {
    fn add(&mut self, store: &str, record: Value) -> StoreResult<Value> {
        self.state_mut(store)?.insert_new(record)
    }

    fn add_many(&mut self, store: &str, records: Vec<Value>) -> StoreResult<Vec<Value>> {
        let state = self.state_mut(store)?;
        let snapshot_records = state.records.clone();
        let snapshot_next_key = state.next_key;

        let mut keys = Vec::with_capacity(records.len());
        for record in records {
            match state.insert_new(record) {
                Ok(key) => keys.push(key),
                Err(err) => {
                    // Batch is atomic: roll the store back to before the batch.
                    state.records = snapshot_records;
                    state.next_key = snapshot_next_key;
                    return Err(err);
                }
            }
        }
        Ok(keys)
    }

    fn get(&self, store: &str, key: &Value) -> StoreResult<Option<Value>> {
        let state = self.state(store)?;
        Ok(state.records.get(&canonical(key)).cloned())
    }

    fn get_all(&self, store: &str) -> StoreResult<Vec<Value>> {
        let state = self.state(store)?;
        Ok(state.records.values().cloned().collect())
    }

    fn get_all_by_index(&self, store: &str, index: &str, query: &Value) -> StoreResult<Vec<Value>> {
        let state = self.state(store)?;
        let index = state.definition.index(index).ok_or_else(|| {
            StoreError::Backend(format!("no index '{index}' on object store '{store}'"))
        })?;

        let matching = state
            .records
            .values()
            .filter(|record| match lookup_path(record, &index.key_path) {
                Some(Value::Array(elements)) if index.multi_entry => {
                    elements.iter().any(|e| e == query)
                }
                Some(value) => value == query,
                None => false,
            })
            .cloned()
            .collect();
        Ok(matching)
    }

    fn put(&mut self, store: &str, record: Value) -> StoreResult<()> {
        let state = self.state_mut(store)?;
        let (key, record) = state.prepare_key(record)?;
        let canonical = canonical(&key);
        state.check_unique(&record, Some(canonical.as_str()))?;
        state.records.insert(canonical, record);
        Ok(())
    }

    fn delete(&mut self, store: &str, key: &Value) -> StoreResult<bool> {
        let state = self.state_mut(store)?;
        Ok(state.records.remove(&canonical(key)).is_some())
    }

    fn count(&self, store: &str) -> StoreResult<u32> {
        Ok(self.state(store)?.records.len() as u32)
    }

    fn clear(&mut self, store: &str) -> StoreResult<()> {
        // The key generator is not reset by a clear.
        self.state_mut(store)?.records.clear();
        Ok(())
    }
}

impl StoreState {
    fn insert_new(&mut self, record: Value) -> StoreResult<Value> {
        let (key, record) = self.prepare_key(record)?;
        let canonical = canonical(&key);
        if self.records.contains_key(&canonical) {
            return Err(StoreError::Constraint(format!(
                "key {key} already exists in store '{}'",
                self.definition.name
            )));
        }
        self.check_unique(&record, None)?;
        self.records.insert(canonical, record);
        Ok(key)
    }

    /// Extract the record's key, or assign one when the store
    /// auto-increments and the key field is absent.
    fn prepare_key(&mut self, mut record: Value) -> StoreResult<(Value, Value)> {
        if !record.is_object() {
            return Err(StoreError::InvalidArgument(
                "record must be a JSON object".to_string(),
            ));
        }

        let key_path = self.definition.key_path.clone();
        match lookup_path(&record, &key_path) {
            Some(key) => {
                if !is_valid_key(key) {
                    return Err(StoreError::InvalidArgument(format!(
                        "key field '{key_path}' must be a string or a number"
                    )));
                }
                let key = key.clone();
                // An explicit numeric key advances the generator past it.
                if self.definition.auto_increment {
                    if let Some(n) = key.as_u64() {
                        self.next_key = self.next_key.max(n + 1);
                    }
                }
                Ok((key, record))
            }
            None => {
                if !self.definition.auto_increment {
                    return Err(StoreError::InvalidArgument(format!(
                        "record is missing key field '{key_path}'"
                    )));
                }
                let key = Value::from(self.next_key);
                self.next_key += 1;
                set_path(&mut record, &key_path, key.clone());
                Ok((key, record))
            }
        }
    }

    /// Enforce unique indexes. `replacing` is the canonical key of a record
    /// being overwritten, which is allowed to collide with itself.
    fn check_unique(&self, record: &Value, replacing: Option<&str>) -> StoreResult<()> {
        for index in self.definition.indexes.iter().filter(|i| i.unique) {
            let Some(candidate) = lookup_path(record, &index.key_path) else {
                continue;
            };
            for (key, existing) in &self.records {
                if replacing == Some(key.as_str()) {
                    continue;
                }
                if lookup_path(existing, &index.key_path) == Some(candidate) {
                    return Err(StoreError::Constraint(format!(
                        "unique index '{}' already holds {candidate}",
                        index.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Canonical map key for a record key value.
fn canonical(key: &Value) -> String {
    key.to_string()
}

fn is_valid_key(key: &Value) -> bool {
    key.is_string() || key.is_number()
}

/// Write a value at a dotted key path, creating intermediate objects.
fn set_path(record: &mut Value, path: &str, value: Value) {
    let mut current = record;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(map) = current.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}
