//! CRUD operation tests for the in-memory reference backend
//!
//! These exercise the contract the browser backend mirrors: add/get
//! round-trips, put semantics, delete, clear, and index equality queries.

use pretty_assertions::assert_eq;
use satchel_core::schema::{store_definition, FieldSpec};
use satchel_core::storage::{MemoryStore, RecordStore};
use serde_json::json;

/// Helper to build a store with explicit keys and a name index.
fn contacts_store() -> MemoryStore {
    let definition = store_definition(
        "contacts",
        &[FieldSpec::key("id"), FieldSpec::indexed("name")],
    )
    .unwrap();
    MemoryStore::new(vec![definition])
}

#[test]
fn test_add_then_get_returns_deep_equal_record() {
    let mut store = contacts_store();
    let record = json!({"id": 7, "name": "Ada", "city": "London"});

    store.add("contacts", record.clone()).unwrap();

    let retrieved = store.get("contacts", &json!(7)).unwrap();
    assert_eq!(retrieved, Some(record));
}

#[test]
fn test_get_missing_key_is_none_not_error() {
    let store = contacts_store();
    let result = store.get("contacts", &json!(42)).unwrap();
    assert_eq!(result, None);
}

#[test]
fn test_put_existing_key_leaves_count_unchanged() {
    let mut store = contacts_store();
    store.add("contacts", json!({"id": 1, "name": "A"})).unwrap();
    store.add("contacts", json!({"id": 2, "name": "B"})).unwrap();

    store.put("contacts", json!({"id": 1, "name": "A2"})).unwrap();
    assert_eq!(store.count("contacts").unwrap(), 2);
}

#[test]
fn test_put_new_key_increases_count_by_one() {
    let mut store = contacts_store();
    store.add("contacts", json!({"id": 1, "name": "A"})).unwrap();

    store.put("contacts", json!({"id": 2, "name": "B"})).unwrap();
    assert_eq!(store.count("contacts").unwrap(), 2);
}

#[test]
fn test_delete_then_get_returns_none() {
    let mut store = contacts_store();
    store.add("contacts", json!({"id": 1, "name": "A"})).unwrap();

    assert!(store.delete("contacts", &json!(1)).unwrap());
    assert_eq!(store.get("contacts", &json!(1)).unwrap(), None);
}

#[test]
fn test_delete_missing_key_returns_false() {
    let mut store = contacts_store();
    assert!(!store.delete("contacts", &json!(1)).unwrap());
}

#[test]
fn test_clear_empties_store() {
    let mut store = contacts_store();
    store.add("contacts", json!({"id": 1, "name": "A"})).unwrap();
    store.add("contacts", json!({"id": 2, "name": "B"})).unwrap();

    store.clear("contacts").unwrap();

    assert_eq!(store.count("contacts").unwrap(), 0);
    assert_eq!(store.get_all("contacts").unwrap(), Vec::<serde_json::Value>::new());
}

#[test]
fn test_index_query_returns_exactly_matching_subset() {
    let mut store = contacts_store();
    store.add("contacts", json!({"id": 1, "name": "A"})).unwrap();
    store.add("contacts", json!({"id": 2, "name": "B"})).unwrap();

    let matching = store
        .get_all_by_index("contacts", "name", &json!("B"))
        .unwrap();
    assert_eq!(matching, vec![json!({"id": 2, "name": "B"})]);
}

#[test]
fn test_index_query_with_no_matches_is_empty() {
    let mut store = contacts_store();
    store.add("contacts", json!({"id": 1, "name": "A"})).unwrap();

    let matching = store
        .get_all_by_index("contacts", "name", &json!("Z"))
        .unwrap();
    assert!(matching.is_empty());
}

#[test]
fn test_add_many_returns_keys_in_input_order() {
    let mut store = contacts_store();
    let keys = store
        .add_many(
            "contacts",
            vec![
                json!({"id": 3, "name": "C"}),
                json!({"id": 1, "name": "A"}),
                json!({"id": 2, "name": "B"}),
            ],
        )
        .unwrap();

    assert_eq!(keys, vec![json!(3), json!(1), json!(2)]);
    assert_eq!(store.count("contacts").unwrap(), 3);
}

#[test]
fn test_multi_entry_index_matches_array_elements() {
    let definition = store_definition(
        "posts",
        &[FieldSpec::key("id"), FieldSpec::multi_indexed("tags")],
    )
    .unwrap();
    let mut store = MemoryStore::new(vec![definition]);

    store
        .add("posts", json!({"id": 1, "tags": ["rust", "wasm"]}))
        .unwrap();
    store.add("posts", json!({"id": 2, "tags": ["go"]})).unwrap();

    let matching = store.get_all_by_index("posts", "tags", &json!("wasm")).unwrap();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0]["id"], json!(1));
}
