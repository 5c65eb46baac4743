//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`. Every request
//! and transaction settles exactly once: the success and error handlers
//! drop each other the first time either fires.

use js_sys::{Function, Promise, Reflect};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    DomException, IdbDatabase, IdbFactory, IdbOpenDbRequest, IdbRequest, IdbTransaction,
    IdbTransactionMode,
};

use satchel_core::schema::{DatabaseInfo, DatabaseSchema};

use crate::error::{IndexedDbError, Result};

/// Rejection name used when a version change is blocked by another open
/// connection. Not a platform exception; minted here so every awaiter of a
/// shared open promise can classify the rejection.
const BLOCKED_NAME: &str = "BlockedError";

type EventClosure = Closure<dyn FnMut(web_sys::Event)>;
type UpgradeEventClosure = Closure<dyn FnMut(web_sys::IdbVersionChangeEvent)>;

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Rejection value for a failed request: the platform's DOMException when
/// present, so callers can classify (e.g. ConstraintError), else a string.
fn request_error_value(req: &IdbRequest) -> JsValue {
    req.error()
        .ok()
        .flatten()
        .map(JsValue::from)
        .unwrap_or_else(|| JsValue::from_str("unknown IDB error"))
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's result.
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req_success = req.clone();
    let req_error = req.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
        let closures: Rc<RefCell<Option<(EventClosure, EventClosure)>>> =
            Rc::new(RefCell::new(None));

        let req_s = req_success.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = reject.call1(&JsValue::UNDEFINED, &request_error_value(&req_e));
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // Keep both closures alive until one fires
        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Convert an IdbTransaction's completion into a JS Promise.
///
/// Resolves on `complete`; rejects on `error` or `abort`. A failed request
/// fires `error` and then `abort` on the same transaction, so the first
/// terminal event detaches every handler before the closures are dropped.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let tx_complete = tx.clone();
    let tx_error = tx.clone();
    let tx_abort = tx.clone();

    fn detach(tx: &IdbTransaction) {
        tx.set_oncomplete(None);
        tx.set_onerror(None);
        tx.set_onabort(None);
    }

    Promise::new(&mut move |resolve, reject| {
        let closures: Rc<RefCell<Option<(EventClosure, EventClosure, EventClosure)>>> =
            Rc::new(RefCell::new(None));

        let tx_c = tx_complete.clone();
        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            detach(&tx_c);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_e = tx_error.clone();
        let reject_error = reject.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = tx_e
                .error()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("transaction error"));
            let _ = reject_error.call1(&JsValue::UNDEFINED, &err);
            detach(&tx_e);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_a = tx_abort.clone();
        let closures_for_abort = closures.clone();
        let on_abort = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = tx_a
                .error()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("transaction aborted"));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            detach(&tx_a);
            *closures_for_abort.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx_complete.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        tx_abort.set_onabort(Some(on_abort.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_error, on_abort));
    })
}

/// A native open in flight: the promise (clonable, so racing callers share
/// one native open) and the cell an upgrade failure is reported through.
#[derive(Debug, Clone)]
pub struct PendingOpen {
    pub promise: Promise,
    upgrade_failure: Rc<RefCell<Option<String>>>,
}

/// Issue a native open for `schema` without awaiting it.
///
/// The upgrade callback runs iff `schema.version` exceeds the stored
/// version; inside it the schema's stores and indexes are created. A
/// failure while applying the schema aborts the version change and is
/// reported as `Upgrade` by [`await_open`].
pub fn open_database_request(schema: &DatabaseSchema) -> Result<PendingOpen> {
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(&schema.name, schema.version)
        .map_err(|e| IndexedDbError::Open(format!("{:?}", e)))?;

    let upgrade_failure: Rc<RefCell<Option<String>>> = Rc::new(RefCell::new(None));

    let req_success = open_req.clone();
    let req_error = open_req.clone();
    let req_blocked = open_req.clone();
    let req_upgrade = open_req.clone();
    let schema_for_upgrade = schema.clone();
    let failure_for_upgrade = upgrade_failure.clone();

    let promise = Promise::new(&mut move |resolve, reject| {
        type OpenClosures = (EventClosure, EventClosure, EventClosure, UpgradeEventClosure);
        let closures: Rc<RefCell<Option<OpenClosures>>> = Rc::new(RefCell::new(None));

        let req_s = req_success.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req_error.clone();
        let reject_error = reject.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = reject_error.call1(&JsValue::UNDEFINED, &request_error_value(&req_e));
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let blocked_name = schema_for_upgrade.name.clone();
        let on_blocked = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            // Reject now; no retry. The request itself stays registered: the
            // platform may still complete the open once the other connection
            // closes, and a settled promise ignores the late resolution.
            let msg = format!(
                "version change for '{}' blocked by another open connection",
                blocked_name
            );
            let err = DomException::new_with_message_and_name(&msg, BLOCKED_NAME)
                .map(JsValue::from)
                .unwrap_or_else(|_| JsValue::from_str(&msg));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_u = req_upgrade.clone();
        let schema = schema_for_upgrade.clone();
        let failure = failure_for_upgrade.clone();
        let on_upgrade = Closure::wrap(Box::new(move |_event: web_sys::IdbVersionChangeEvent| {
            if let Err(msg) = apply_schema(&req_u, &schema) {
                *failure.borrow_mut() = Some(msg);
                // Abort the version change so the open request rejects.
                if let Some(tx) = req_u.transaction() {
                    let _ = tx.abort();
                }
            }
        })
            as Box<dyn FnMut(web_sys::IdbVersionChangeEvent)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        req_blocked.set_onblocked(Some(on_blocked.as_ref().unchecked_ref()));
        req_upgrade.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

        // Keep all four alive until the open settles
        *closures.borrow_mut() = Some((on_success, on_error, on_blocked, on_upgrade));
    });

    Ok(PendingOpen {
        promise,
        upgrade_failure,
    })
}

/// Await a pending open, classifying the outcome.
pub async fn await_open(pending: &PendingOpen) -> Result<IdbDatabase> {
    match wasm_bindgen_futures::JsFuture::from(pending.promise.clone()).await {
        Ok(result) => result
            .dyn_into::<IdbDatabase>()
            .map_err(|_| IndexedDbError::Open("open result is not IdbDatabase".into())),
        Err(err) => {
            if let Some(msg) = pending.upgrade_failure.borrow().clone() {
                return Err(IndexedDbError::Upgrade(msg));
            }
            Err(classify_open_error(err))
        }
    }
}

fn classify_open_error(err: JsValue) -> IndexedDbError {
    if let Some(exception) = err.dyn_ref::<DomException>() {
        let msg = format!("{}: {}", exception.name(), exception.message());
        return match exception.name().as_str() {
            BLOCKED_NAME => IndexedDbError::Blocked(msg),
            // The upgrade transaction aborted under a racing awaiter that
            // has no view of the initiator's failure cell.
            "AbortError" => IndexedDbError::Upgrade(msg),
            _ => IndexedDbError::Open(msg),
        };
    }
    let msg = js_sys::JSON::stringify(&err)
        .map(String::from)
        .unwrap_or_else(|_| format!("{:?}", err));
    IndexedDbError::Open(msg)
}

/// Create the schema's missing stores and indexes inside the version-change
/// transaction. Runs only in the upgrade callback.
fn apply_schema(req: &IdbOpenDbRequest, schema: &DatabaseSchema) -> std::result::Result<(), String> {
    let db: IdbDatabase = req
        .result()
        .map_err(|e| format!("no result on upgrade: {:?}", e))?
        .unchecked_into();

    let existing = db.object_store_names();
    for def in &schema.stores {
        let store = if existing.contains(&def.name) {
            // Existing store: reachable only through the upgrade transaction
            let tx = req
                .transaction()
                .ok_or_else(|| "no upgrade transaction".to_string())?;
            tx.object_store(&def.name)
                .map_err(|e| format!("open store '{}': {:?}", def.name, e))?
        } else {
            let params = web_sys::IdbObjectStoreParameters::new();
            Reflect::set(&params, &"keyPath".into(), &JsValue::from_str(&def.key_path))
                .map_err(|e| format!("set keyPath: {:?}", e))?;
            if def.auto_increment {
                Reflect::set(&params, &"autoIncrement".into(), &JsValue::TRUE)
                    .map_err(|e| format!("set autoIncrement: {:?}", e))?;
            }
            db.create_object_store_with_optional_parameters(&def.name, &params)
                .map_err(|e| format!("create store '{}': {:?}", def.name, e))?
        };

        let index_names = store.index_names();
        for index in &def.indexes {
            if index_names.contains(&index.name) {
                continue;
            }
            let params = web_sys::IdbIndexParameters::new();
            if index.unique {
                Reflect::set(&params, &"unique".into(), &JsValue::TRUE)
                    .map_err(|e| format!("set unique: {:?}", e))?;
            }
            if index.multi_entry {
                Reflect::set(&params, &"multiEntry".into(), &JsValue::TRUE)
                    .map_err(|e| format!("set multiEntry: {:?}", e))?;
            }
            store
                .create_index_with_str_and_optional_parameters(
                    &index.name,
                    &index.key_path,
                    &params,
                )
                .map_err(|e| format!("create index '{}': {:?}", index.name, e))?;
        }
    }
    Ok(())
}

/// Start a transaction over one or more stores.
pub fn begin_transaction(
    db: &IdbDatabase,
    stores: &[&str],
    mode: IdbTransactionMode,
) -> Result<IdbTransaction> {
    let tx = if let [single] = stores {
        db.transaction_with_str_and_mode(single, mode)
    } else {
        let names = js_sys::Array::new();
        for store in stores {
            names.push(&JsValue::from_str(store));
        }
        db.transaction_with_str_sequence_and_mode(&names, mode)
    };
    tx.map_err(|e| IndexedDbError::Transaction(format!("{:?}", e)))
}

/// Await an IdbRequest, resolving to its result JsValue.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    let promise = request_to_promise(req);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::from)
}

/// Await an IdbTransaction's completion.
pub async fn await_transaction(tx: &IdbTransaction) -> Result<()> {
    let promise = transaction_to_promise(tx);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::from)?;
    Ok(())
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {:?}", e)))?;
    let promise = request_to_promise(req.unchecked_ref());
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", IndexedDbError::from(e))))?;
    Ok(())
}

/// Enumerate databases as {name, version} pairs.
///
/// `indexedDB.databases()` is reached through `Reflect` because web-sys
/// does not bind it on stable features.
pub async fn list_databases() -> Result<Vec<DatabaseInfo>> {
    let factory = idb_factory()?;

    let method = Reflect::get(factory.as_ref(), &"databases".into())
        .map_err(|_| IndexedDbError::NotAvailable("no databases() on factory".into()))?;
    let method: Function = method
        .dyn_into()
        .map_err(|_| IndexedDbError::NotAvailable("databases() is not a function".into()))?;

    let promise: Promise = method
        .call0(factory.as_ref())
        .map_err(IndexedDbError::from)?
        .dyn_into()
        .map_err(|_| IndexedDbError::JsValue("databases() did not return a promise".into()))?;

    let result = wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::from)?;

    let array = js_sys::Array::from(&result);
    let mut infos = Vec::with_capacity(array.length() as usize);
    for i in 0..array.length() {
        let entry = array.get(i);
        let name = Reflect::get(&entry, &"name".into())
            .ok()
            .and_then(|v| v.as_string());
        let version = Reflect::get(&entry, &"version".into())
            .ok()
            .and_then(|v| v.as_f64());
        if let (Some(name), Some(version)) = (name, version) {
            infos.push(DatabaseInfo {
                name,
                version: version as u32,
            });
        }
    }
    Ok(infos)
}
