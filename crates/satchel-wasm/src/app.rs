//! Contact-book CRUD exports using wasm-bindgen and the IndexedDB bridge
//!
//! One export per user action, awaited to completion before the page
//! updates its presented state. Contacts cross the boundary as JSON
//! strings; errors surface as rejected promises with a message. This is
//! the only layer allowed to flatten an error into a user-facing notice.

use std::cell::RefCell;

use satchel_core::schema::{FieldSpec, Model};
use satchel_indexeddb::{Bridge, ConnectionRegistry, Store};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

/// Composition-root state (initialized via init_app).
/// Thread-local RefCell because WASM is single-threaded and the store is
/// shared across async boundaries.
thread_local! {
    static APP: RefCell<Option<AppState>> = RefCell::new(None);
}

struct AppState {
    bridge: Bridge,
    contacts: Store<Contact>,
}

/// Default database name for the demo.
const DEFAULT_DB_NAME: &str = "satchel-demo";

/// Bump when the contact store gains indexes or sibling stores.
const DB_VERSION: u32 = 1;

/// A contact-book entry. `id` is assigned by the store on first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub name: String,
    pub city: String,
}

impl Model for Contact {
    const STORE: &'static str = "contacts";

    fn fields() -> &'static [FieldSpec] {
        const FIELDS: &[FieldSpec] = &[
            FieldSpec::auto_key("id"),
            FieldSpec::indexed("name"),
            FieldSpec::indexed("city"),
        ];
        FIELDS
    }
}

/// Initialize the demo app. Must be called before any other operation.
/// Returns a Promise that resolves when the database is open.
#[wasm_bindgen]
pub async fn init_app(db_name: Option<String>) -> Result<(), JsValue> {
    // Route Rust panics to console.error instead of "RuntimeError: unreachable"
    console_error_panic_hook::set_once();

    let name = db_name.unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

    // Composition root: the registry is created here and injected by Rc.
    let bridge = Bridge::new(ConnectionRegistry::shared());
    let contacts = Store::open(bridge.clone(), &name, DB_VERSION)
        .await
        .map_err(|e| JsValue::from_str(&format!("Failed to open IndexedDB: {}", e)))?;

    APP.with(|app| {
        let mut app = app.borrow_mut();
        if app.is_some() {
            return Err(JsValue::from_str("App already initialized"));
        }
        web_sys::console::log_1(&JsValue::from_str(&format!(
            "satchel demo: contact book open on '{}'",
            name
        )));
        *app = Some(AppState { bridge, contacts });
        Ok(())
    })
}

/// Dispose the app: further operations fail and connections are released.
/// In-flight requests are not cancelled.
#[wasm_bindgen]
pub fn shutdown_app() -> bool {
    APP.with(|app| match app.borrow_mut().take() {
        Some(state) => {
            state.bridge.dispose();
            true
        }
        None => false,
    })
}

/// Check if the app is initialized.
#[wasm_bindgen]
pub fn is_app_initialized() -> bool {
    APP.with(|app| app.borrow().is_some())
}

/// Get the satchel version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get a clone of the contact store. Panics if not initialized.
fn contacts() -> Store<Contact> {
    APP.with(|app| {
        app.borrow()
            .as_ref()
            .expect("App not initialized. Call init_app() first.")
            .contacts
            .clone()
    })
}

fn store_err(e: satchel_core::StoreError) -> JsValue {
    JsValue::from_str(&format!("Store error: {}", e))
}

// ============================================================================
// CRUD operations
// ============================================================================

/// Add a contact from JSON (`{"name": "...", "city": "..."}`).
/// Resolves to the assigned id.
#[wasm_bindgen]
pub async fn add_contact(json: &str) -> Result<u32, JsValue> {
    let contact: Contact = serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))?;

    let key = contacts().add(&contact).await.map_err(store_err)?;
    Ok(key.as_u64().unwrap_or_default() as u32)
}

/// Add a batch of contacts from a JSON array, atomically.
/// Resolves to a JSON array of the assigned ids.
#[wasm_bindgen]
pub async fn add_contacts(json: &str) -> Result<String, JsValue> {
    let batch: Vec<Contact> = serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))?;

    let keys = contacts().add_many(&batch).await.map_err(store_err)?;
    serde_json::to_string(&keys)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// List every contact as a JSON array.
#[wasm_bindgen]
pub async fn list_contacts() -> Result<String, JsValue> {
    let all = contacts().get_all().await.map_err(store_err)?;
    serde_json::to_string(&all)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Get one contact by id as JSON, or null if absent.
#[wasm_bindgen]
pub async fn get_contact(id: u32) -> Result<Option<String>, JsValue> {
    match contacts().get_one(id).await.map_err(store_err)? {
        Some(contact) => {
            let json = serde_json::to_string(&contact)
                .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))?;
            Ok(Some(json))
        }
        None => Ok(None),
    }
}

/// Replace a contact by its id (JSON must carry `id`).
#[wasm_bindgen]
pub async fn update_contact(json: &str) -> Result<(), JsValue> {
    let contact: Contact = serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("Invalid JSON: {}", e)))?;

    contacts().update(&contact).await.map_err(store_err)
}

/// Delete a contact by id.
/// Resolves to true if it existed, false otherwise.
#[wasm_bindgen]
pub async fn delete_contact(id: u32) -> Result<bool, JsValue> {
    contacts().delete(id).await.map_err(store_err)
}

/// Contacts in a city (equality query on the `city` index), as JSON.
#[wasm_bindgen]
pub async fn contacts_in_city(city: &str) -> Result<String, JsValue> {
    let matching = contacts()
        .get_all_by_index("city", city)
        .await
        .map_err(store_err)?;
    serde_json::to_string(&matching)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Contacts with a given name (equality query on the `name` index), as JSON.
#[wasm_bindgen]
pub async fn contacts_named(name: &str) -> Result<String, JsValue> {
    let matching = contacts()
        .get_all_by_index("name", name)
        .await
        .map_err(store_err)?;
    serde_json::to_string(&matching)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Total number of contacts.
#[wasm_bindgen]
pub async fn contact_count() -> Result<u32, JsValue> {
    contacts().count().await.map_err(store_err)
}

/// Remove every contact.
#[wasm_bindgen]
pub async fn clear_contacts() -> Result<(), JsValue> {
    contacts().clear().await.map_err(store_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_schema_derives() {
        let def = Contact::definition().unwrap();
        assert_eq!(def.name, "contacts");
        assert_eq!(def.key_path, "id");
        assert!(def.auto_increment);
        assert!(def.index("name").is_some());
        assert!(def.index("city").is_some());
    }

    #[test]
    fn contact_omits_unassigned_id() {
        let contact = Contact {
            id: None,
            name: "Ada".to_string(),
            city: "London".to_string(),
        };
        let json = serde_json::to_value(&contact).unwrap();
        assert!(json.get("id").is_none());
    }
}
