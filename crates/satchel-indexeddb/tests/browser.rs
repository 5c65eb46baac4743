//! Browser integration tests for the IndexedDB bridge
//!
//! Run with `wasm-pack test --headless --chrome`. Each test uses its own
//! database name and drops leftovers first, so runs are independent.

#![cfg(target_arch = "wasm32")]

use wasm_bindgen_test::*;

use satchel_core::schema::{store_definition, DatabaseSchema, FieldSpec, IndexDefinition, Model};
use satchel_core::StoreError;
use satchel_indexeddb::{Bridge, ConnectionRegistry, IndexedDbError, Store};
use serde::{Deserialize, Serialize};
use serde_json::json;

wasm_bindgen_test_configure!(run_in_browser);

fn contacts_schema(db: &str) -> DatabaseSchema {
    DatabaseSchema::new(db, 1).store(
        store_definition(
            "contacts",
            &[FieldSpec::key("id"), FieldSpec::indexed("name")],
        )
        .unwrap(),
    )
}

fn bridge() -> Bridge {
    Bridge::new(ConnectionRegistry::shared())
}

async fn fresh(db: &str) -> (Bridge, satchel_indexeddb::Handle) {
    let bridge = bridge();
    bridge.delete_database(db).await.unwrap();
    let handle = bridge.open(&contacts_schema(db)).await.unwrap();
    (bridge, handle)
}

#[wasm_bindgen_test]
async fn concurrent_opens_share_one_native_open() {
    let bridge = bridge();
    bridge.delete_database("satchel-test-race").await.unwrap();

    let schema = contacts_schema("satchel-test-race");
    let (first, second) = futures::future::join(bridge.open(&schema), bridge.open(&schema)).await;

    let first = first.unwrap();
    let second = second.unwrap();
    // One native open: both handles wrap the same connection object.
    assert!(first.is_same_connection(&second));
}

#[wasm_bindgen_test]
async fn reopen_returns_cached_connection() {
    let (bridge, handle) = fresh("satchel-test-cache").await;
    let again = bridge
        .open(&contacts_schema("satchel-test-cache"))
        .await
        .unwrap();
    assert!(handle.is_same_connection(&again));
}

#[wasm_bindgen_test]
async fn add_then_get_returns_deep_equal_record() {
    let (bridge, handle) = fresh("satchel-test-roundtrip").await;
    let record = json!({"id": 7, "name": "Ada", "tags": ["math", "engines"]});

    let key = bridge.add(&handle, "contacts", &record).await.unwrap();
    assert_eq!(key, json!(7));

    let found = bridge.get(&handle, "contacts", &json!(7)).await.unwrap();
    assert_eq!(found, Some(record));
}

#[wasm_bindgen_test]
async fn get_missing_key_is_none_not_error() {
    let (bridge, handle) = fresh("satchel-test-missing").await;
    let found = bridge.get(&handle, "contacts", &json!(99)).await.unwrap();
    assert_eq!(found, None);
}

#[wasm_bindgen_test]
async fn add_duplicate_key_is_constraint_error() {
    let (bridge, handle) = fresh("satchel-test-dup").await;
    bridge
        .add(&handle, "contacts", &json!({"id": 1, "name": "A"}))
        .await
        .unwrap();

    let result = bridge
        .add(&handle, "contacts", &json!({"id": 1, "name": "B"}))
        .await;
    assert!(matches!(result, Err(IndexedDbError::Constraint(_))));
}

#[wasm_bindgen_test]
async fn put_replacing_key_leaves_count_unchanged() {
    let (bridge, handle) = fresh("satchel-test-put").await;
    bridge
        .add(&handle, "contacts", &json!({"id": 1, "name": "A"}))
        .await
        .unwrap();

    bridge
        .put(&handle, "contacts", &json!({"id": 1, "name": "A2"}))
        .await
        .unwrap();
    assert_eq!(bridge.count(&handle, "contacts").await.unwrap(), 1);

    bridge
        .put(&handle, "contacts", &json!({"id": 2, "name": "B"}))
        .await
        .unwrap();
    assert_eq!(bridge.count(&handle, "contacts").await.unwrap(), 2);
}

#[wasm_bindgen_test]
async fn delete_then_get_returns_none() {
    let (bridge, handle) = fresh("satchel-test-delete").await;
    bridge
        .add(&handle, "contacts", &json!({"id": 1, "name": "A"}))
        .await
        .unwrap();

    assert!(bridge.delete(&handle, "contacts", &json!(1)).await.unwrap());
    assert_eq!(
        bridge.get(&handle, "contacts", &json!(1)).await.unwrap(),
        None
    );
    // Deleting an absent key reports false, not an error.
    assert!(!bridge.delete(&handle, "contacts", &json!(1)).await.unwrap());
}

#[wasm_bindgen_test]
async fn clear_empties_store() {
    let (bridge, handle) = fresh("satchel-test-clear").await;
    bridge
        .add_many(
            &handle,
            "contacts",
            &[
                json!({"id": 1, "name": "A"}),
                json!({"id": 2, "name": "B"}),
            ],
        )
        .await
        .unwrap();

    bridge.clear(&handle, "contacts").await.unwrap();

    assert_eq!(bridge.count(&handle, "contacts").await.unwrap(), 0);
    assert!(bridge.get_all(&handle, "contacts").await.unwrap().is_empty());
}

#[wasm_bindgen_test]
async fn index_query_returns_exactly_matching_subset() {
    let (bridge, handle) = fresh("satchel-test-index").await;
    bridge
        .add(&handle, "contacts", &json!({"id": 1, "name": "A"}))
        .await
        .unwrap();
    bridge
        .add(&handle, "contacts", &json!({"id": 2, "name": "B"}))
        .await
        .unwrap();

    let matching = bridge
        .get_all_by_index(&handle, "contacts", "name", &json!("B"))
        .await
        .unwrap();
    assert_eq!(matching, vec![json!({"id": 2, "name": "B"})]);
}

#[wasm_bindgen_test]
async fn add_many_returns_keys_and_is_atomic() {
    let (bridge, handle) = fresh("satchel-test-batch").await;

    let keys = bridge
        .add_many(
            &handle,
            "contacts",
            &[
                json!({"id": 3, "name": "C"}),
                json!({"id": 1, "name": "A"}),
            ],
        )
        .await
        .unwrap();
    assert_eq!(keys, vec![json!(3), json!(1)]);

    // A colliding record aborts the whole batch.
    let result = bridge
        .add_many(
            &handle,
            "contacts",
            &[
                json!({"id": 5, "name": "E"}),
                json!({"id": 1, "name": "dup"}),
            ],
        )
        .await;
    assert!(result.is_err());
    assert_eq!(bridge.count(&handle, "contacts").await.unwrap(), 2);
    assert_eq!(
        bridge.get(&handle, "contacts", &json!(5)).await.unwrap(),
        None
    );
}

#[wasm_bindgen_test]
async fn create_index_reopens_at_next_version() {
    let bridge = bridge();
    bridge.delete_database("satchel-test-upgrade").await.unwrap();

    let schema = contacts_schema("satchel-test-upgrade");
    let handle = bridge.open(&schema).await.unwrap();
    bridge
        .add(&handle, "contacts", &json!({"id": 1, "name": "A", "city": "Oslo"}))
        .await
        .unwrap();

    let (handle, upgraded) = bridge
        .create_index(&schema, "contacts", IndexDefinition::new("city", false))
        .await
        .unwrap();

    assert_eq!(handle.version(), 2);
    assert_eq!(upgraded.version, 2);

    // Existing records are indexed and survive the upgrade.
    let in_oslo = bridge
        .get_all_by_index(&handle, "contacts", "city", &json!("Oslo"))
        .await
        .unwrap();
    assert_eq!(in_oslo.len(), 1);
}

#[wasm_bindgen_test]
async fn explicit_transaction_commits_both_writes() {
    let (bridge, handle) = fresh("satchel-test-txn").await;

    let tx = bridge
        .begin_transaction(
            &handle,
            &["contacts"],
            satchel_indexeddb::TransactionMode::ReadWrite,
        )
        .unwrap();
    tx.add("contacts", &json!({"id": 1, "name": "A"})).await.unwrap();
    tx.add("contacts", &json!({"id": 2, "name": "B"})).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(bridge.count(&handle, "contacts").await.unwrap(), 2);
}

#[wasm_bindgen_test]
async fn open_blocked_by_other_connection_is_surfaced() {
    let holder = bridge();
    holder.delete_database("satchel-test-blocked").await.unwrap();
    let _held = holder
        .open(&contacts_schema("satchel-test-blocked"))
        .await
        .unwrap();

    // A separate registry requesting a higher version is blocked by the
    // held connection; surfaced, not retried.
    let mut upgraded = contacts_schema("satchel-test-blocked");
    upgraded.version = 2;
    let result = bridge().open(&upgraded).await;
    assert!(matches!(result, Err(IndexedDbError::Blocked(_))));

    holder.dispose();
}

#[wasm_bindgen_test]
async fn disposed_bridge_fails_further_calls() {
    let (bridge, handle) = fresh("satchel-test-dispose").await;
    bridge.dispose();

    assert!(bridge.is_disposed());
    let result = bridge.get(&handle, "contacts", &json!(1)).await;
    assert!(matches!(result, Err(IndexedDbError::Disposed)));
}

// ============================================================================
// Typed facade
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u32>,
    name: String,
    city: String,
}

impl Model for Contact {
    const STORE: &'static str = "contacts";

    fn fields() -> &'static [FieldSpec] {
        &[
            FieldSpec::auto_key("id"),
            FieldSpec::indexed("name"),
            FieldSpec::indexed("city"),
        ]
    }
}

fn contact(name: &str, city: &str) -> Contact {
    Contact {
        id: None,
        name: name.to_string(),
        city: city.to_string(),
    }
}

#[wasm_bindgen_test]
async fn typed_store_crud_roundtrip() {
    let bridge = bridge();
    bridge.delete_database("satchel-test-typed").await.unwrap();

    let store: Store<Contact> = Store::open(bridge, "satchel-test-typed", 1).await.unwrap();

    // Auto-increment assigns the first key.
    let key = store.add(&contact("Ada", "London")).await.unwrap();
    assert_eq!(key, json!(1));
    store
        .add_many(&[contact("Grace", "New York"), contact("Edsger", "Austin")])
        .await
        .unwrap();
    assert_eq!(store.count().await.unwrap(), 3);

    let ada = store.get_one(1u32).await.unwrap().unwrap();
    assert_eq!(ada.name, "Ada");
    assert_eq!(ada.id, Some(1));

    // Update by key; count is unchanged.
    let moved = Contact {
        city: "Cambridge".to_string(),
        ..ada
    };
    store.update(&moved).await.unwrap();
    assert_eq!(store.count().await.unwrap(), 3);
    let in_cambridge = store.get_all_by_index("city", "Cambridge").await.unwrap();
    assert_eq!(in_cambridge, vec![moved]);

    assert!(store.delete(2u32).await.unwrap());
    assert_eq!(store.get_one(2u32).await.unwrap(), None);

    store.clear().await.unwrap();
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(store.get_all().await.unwrap().is_empty());
}

#[wasm_bindgen_test]
async fn typed_store_rejects_undeclared_index() {
    let bridge = bridge();
    bridge
        .delete_database("satchel-test-typed-index")
        .await
        .unwrap();

    let store: Store<Contact> = Store::open(bridge, "satchel-test-typed-index", 1)
        .await
        .unwrap();

    let result = store.get_all_by_index("email", "a@example.com").await;
    assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
}

#[wasm_bindgen_test]
async fn typed_store_update_requires_key() {
    let bridge = bridge();
    bridge
        .delete_database("satchel-test-typed-update")
        .await
        .unwrap();

    let store: Store<Contact> = Store::open(bridge, "satchel-test-typed-update", 1)
        .await
        .unwrap();

    let result = store.update(&contact("No", "Key")).await;
    assert!(matches!(result, Err(StoreError::InvalidArgument(_))));
}
