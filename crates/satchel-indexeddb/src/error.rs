//! Error types for the IndexedDB bridge

use satchel_core::StoreError;
use thiserror::Error;
use wasm_bindgen::JsCast;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, IndexedDbError>;

/// Errors that can occur against the native object store
#[derive(Debug, Error)]
pub enum IndexedDbError {
    /// IndexedDB is not available in this environment
    #[error("IndexedDB not available: {0}")]
    NotAvailable(String),

    /// Database open was denied or failed
    #[error("IndexedDB open error: {0}")]
    Open(String),

    /// Version change blocked by another open connection; surfaced, never retried
    #[error("IndexedDB open blocked: {0}")]
    Blocked(String),

    /// Applying the upgrade schema failed
    #[error("IndexedDB upgrade error: {0}")]
    Upgrade(String),

    /// Transaction error or abort
    #[error("IndexedDB transaction error: {0}")]
    Transaction(String),

    /// Request error from an IDB operation
    #[error("IndexedDB request error: {0}")]
    Request(String),

    /// Key or unique-index conflict
    #[error("IndexedDB constraint violation: {0}")]
    Constraint(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JavaScript value conversion error
    #[error("JS conversion error: {0}")]
    JsValue(String),

    /// The bridge was disposed; no further calls are accepted
    #[error("bridge has been disposed")]
    Disposed,
}

impl From<wasm_bindgen::JsValue> for IndexedDbError {
    fn from(val: wasm_bindgen::JsValue) -> Self {
        if let Some(exception) = val.dyn_ref::<web_sys::DomException>() {
            let msg = format!("{}: {}", exception.name(), exception.message());
            return match exception.name().as_str() {
                "ConstraintError" => IndexedDbError::Constraint(msg),
                "AbortError" => IndexedDbError::Transaction(msg),
                _ => IndexedDbError::Request(msg),
            };
        }
        let msg = js_sys::JSON::stringify(&val)
            .map(String::from)
            .unwrap_or_else(|_| format!("{:?}", val));
        IndexedDbError::Request(msg)
    }
}

/// Convert IndexedDbError to StoreError for the caller-facing taxonomy
impl From<IndexedDbError> for StoreError {
    fn from(err: IndexedDbError) -> Self {
        match err {
            IndexedDbError::NotAvailable(msg) => {
                StoreError::Open(format!("IndexedDB not available: {}", msg))
            }
            IndexedDbError::Open(msg) => StoreError::Open(msg),
            IndexedDbError::Blocked(msg) => StoreError::Open(format!("blocked: {}", msg)),
            IndexedDbError::Upgrade(msg) => StoreError::Upgrade(msg),
            IndexedDbError::Transaction(msg) => {
                StoreError::Backend(format!("IndexedDB transaction: {}", msg))
            }
            IndexedDbError::Request(msg) => {
                StoreError::Backend(format!("IndexedDB request: {}", msg))
            }
            IndexedDbError::Constraint(msg) => StoreError::Constraint(msg),
            IndexedDbError::Json(e) => StoreError::Serialization(e.to_string()),
            IndexedDbError::JsValue(msg) => StoreError::Backend(format!("IndexedDB JS: {}", msg)),
            IndexedDbError::Disposed => StoreError::Disposed,
        }
    }
}
