//! Store and database schema definitions
//!
//! A [`StoreDefinition`] names an object store, its key path, whether the
//! platform assigns keys (auto-increment), and its secondary indexes. It is
//! derived once at startup — from a model's compile-time field contract via
//! [`store_definition`] — and consumed only at database-upgrade time.
//!
//! # Example
//!
//! ```rust
//! use satchel_core::schema::{store_definition, FieldSpec};
//!
//! let fields = [
//!     FieldSpec::auto_key("id"),
//!     FieldSpec::indexed("name"),
//!     FieldSpec::plain("notes"),
//! ];
//!
//! let def = store_definition("contacts", &fields).unwrap();
//! assert_eq!(def.key_path, "id");
//! assert!(def.auto_increment);
//! assert_eq!(def.indexes.len(), 1);
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role a field plays in its object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// The store's primary key. With `auto_increment` the platform assigns
    /// keys for records that omit the field.
    Key { auto_increment: bool },

    /// Secondary queryable index over the field. `multi_entry` indexes
    /// array-valued fields element-by-element.
    Indexed { unique: bool, multi_entry: bool },

    /// Stored, not queryable.
    Plain,
}

/// One field of a model's store contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub role: FieldRole,
}

impl FieldSpec {
    /// Key field with caller-supplied keys.
    pub const fn key(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Key {
                auto_increment: false,
            },
        }
    }

    /// Key field with platform-assigned keys.
    pub const fn auto_key(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Key {
                auto_increment: true,
            },
        }
    }

    /// Non-unique single-entry index.
    pub const fn indexed(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Indexed {
                unique: false,
                multi_entry: false,
            },
        }
    }

    /// Unique single-entry index.
    pub const fn unique(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Indexed {
                unique: true,
                multi_entry: false,
            },
        }
    }

    /// Non-unique multi-entry index over an array-valued field.
    pub const fn multi_indexed(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Indexed {
                unique: false,
                multi_entry: true,
            },
        }
    }

    /// Plain stored field.
    pub const fn plain(name: &'static str) -> Self {
        Self {
            name,
            role: FieldRole::Plain,
        }
    }
}

/// A secondary, queryable ordering over a non-key field of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub name: String,
    pub key_path: String,
    pub unique: bool,
    #[serde(default)]
    pub multi_entry: bool,
}

impl IndexDefinition {
    /// Index whose name doubles as its key path.
    pub fn new(name: impl Into<String>, unique: bool) -> Self {
        let name = name.into();
        Self {
            key_path: name.clone(),
            name,
            unique,
            multi_entry: false,
        }
    }
}

/// A named object store: key path, auto-increment flag, indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDefinition {
    pub name: String,
    pub key_path: String,
    pub auto_increment: bool,
    pub indexes: Vec<IndexDefinition>,
}

impl StoreDefinition {
    /// Look up a declared index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// A named, versioned collection of store definitions — the unit passed to
/// `open`. Schema changes only apply inside the version-upgrade callback,
/// so declaring a new store or index means opening with a higher version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub name: String,
    pub version: u32,
    pub stores: Vec<StoreDefinition>,
}

impl DatabaseSchema {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            stores: Vec::new(),
        }
    }

    /// Add a store definition (builder style).
    pub fn store(mut self, definition: StoreDefinition) -> Self {
        self.stores.push(definition);
        self
    }

    /// Look up a declared store by name.
    pub fn store_definition(&self, name: &str) -> Option<&StoreDefinition> {
        self.stores.iter().find(|s| s.name == name)
    }

    /// Copy of this schema with `index` declared on `store` and the version
    /// bumped by one — the shape a reopen-to-add-an-index takes.
    pub fn with_index(&self, store: &str, index: IndexDefinition) -> Result<Self, SchemaError> {
        let mut schema = self.clone();
        schema.version += 1;
        let def = schema
            .stores
            .iter_mut()
            .find(|s| s.name == store)
            .ok_or_else(|| SchemaError::UnknownStore(store.to_string()))?;
        if def.indexes.iter().any(|i| i.name == index.name) {
            return Err(SchemaError::DuplicateIndex(
                store.to_string(),
                index.name.clone(),
            ));
        }
        def.indexes.push(index);
        Ok(schema)
    }
}

/// Name and version pair reported by database enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub version: u32,
}

/// Errors in a store's field contract.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// No field carries the key role
    #[error("store '{0}' declares no key field")]
    NoKeyField(String),

    /// More than one field carries the key role
    #[error("store '{store}' declares more than one key field ('{first}' and '{second}')")]
    MultipleKeyFields {
        store: String,
        first: String,
        second: String,
    },

    /// Two indexes collide on a name
    #[error("store '{0}' declares index '{1}' more than once")]
    DuplicateIndex(String, String),

    /// Schema has no store with the given name
    #[error("schema has no store named '{0}'")]
    UnknownStore(String),
}

/// Derive a store definition from a field contract.
///
/// Exactly one field must carry the key role; zero or more may be indexed.
/// Pure, runs once at startup, no I/O.
pub fn store_definition(store: &str, fields: &[FieldSpec]) -> Result<StoreDefinition, SchemaError> {
    let mut key: Option<(&str, bool)> = None;
    let mut indexes: Vec<IndexDefinition> = Vec::new();

    for field in fields {
        match field.role {
            FieldRole::Key { auto_increment } => {
                if let Some((first, _)) = key {
                    return Err(SchemaError::MultipleKeyFields {
                        store: store.to_string(),
                        first: first.to_string(),
                        second: field.name.to_string(),
                    });
                }
                key = Some((field.name, auto_increment));
            }
            FieldRole::Indexed {
                unique,
                multi_entry,
            } => {
                if indexes.iter().any(|i| i.name == field.name) {
                    return Err(SchemaError::DuplicateIndex(
                        store.to_string(),
                        field.name.to_string(),
                    ));
                }
                indexes.push(IndexDefinition {
                    name: field.name.to_string(),
                    key_path: field.name.to_string(),
                    unique,
                    multi_entry,
                });
            }
            FieldRole::Plain => {}
        }
    }

    let (key_path, auto_increment) = key.ok_or_else(|| SchemaError::NoKeyField(store.to_string()))?;

    Ok(StoreDefinition {
        name: store.to_string(),
        key_path: key_path.to_string(),
        auto_increment,
        indexes,
    })
}

/// Walk a dotted key path into a JSON record.
///
/// Returns `None` when any segment is missing or a non-object is traversed.
pub fn lookup_path<'a>(record: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Compile-time store contract for an entity type.
///
/// A model declares its store name and field roles statically; the store
/// definition is derived from them once, outside the hot path. This is the
/// serialization contract the typed facade binds to.
pub trait Model: Serialize + DeserializeOwned {
    /// Object store this type is persisted in.
    const STORE: &'static str;

    /// Field contract: names and roles, exactly one key field.
    fn fields() -> &'static [FieldSpec];

    /// Derived store definition.
    fn definition() -> Result<StoreDefinition, SchemaError> {
        store_definition(Self::STORE, Self::fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_definition_with_single_key() {
        let fields = [
            FieldSpec::key("id"),
            FieldSpec::indexed("name"),
            FieldSpec::unique("email"),
            FieldSpec::plain("notes"),
        ];

        let def = store_definition("contacts", &fields).unwrap();
        assert_eq!(def.name, "contacts");
        assert_eq!(def.key_path, "id");
        assert!(!def.auto_increment);
        assert_eq!(def.indexes.len(), 2);
        assert!(def.index("name").is_some());
        assert!(def.index("email").unwrap().unique);
        assert!(def.index("notes").is_none());
    }

    #[test]
    fn rejects_zero_key_fields() {
        let fields = [FieldSpec::indexed("name")];
        let err = store_definition("contacts", &fields).unwrap_err();
        assert_eq!(err, SchemaError::NoKeyField("contacts".to_string()));
    }

    #[test]
    fn rejects_multiple_key_fields() {
        let fields = [FieldSpec::key("id"), FieldSpec::auto_key("seq")];
        let err = store_definition("contacts", &fields).unwrap_err();
        assert!(matches!(err, SchemaError::MultipleKeyFields { .. }));
    }

    #[test]
    fn with_index_bumps_version_and_declares_index() {
        let schema = DatabaseSchema::new("app", 1).store(
            store_definition("contacts", &[FieldSpec::auto_key("id")]).unwrap(),
        );

        let upgraded = schema
            .with_index("contacts", IndexDefinition::new("name", false))
            .unwrap();

        assert_eq!(upgraded.version, 2);
        assert!(upgraded
            .store_definition("contacts")
            .unwrap()
            .index("name")
            .is_some());
        // original untouched
        assert_eq!(schema.version, 1);
    }

    #[test]
    fn with_index_rejects_unknown_store() {
        let schema = DatabaseSchema::new("app", 1);
        let err = schema
            .with_index("contacts", IndexDefinition::new("name", false))
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownStore("contacts".to_string()));
    }
}
