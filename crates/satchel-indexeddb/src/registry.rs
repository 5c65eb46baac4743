//! Connection registry
//!
//! The explicit handle cache: one slot per database name, populated at most
//! once. Owned by the application's composition root and injected into the
//! bridge by reference (`Rc`), never held as implicit module state.
//!
//! A slot is either an open connection or a pending native open. Racing
//! callers for the same name share the pending open by cloning its promise,
//! so a second native open call is never issued while one is in flight.
//! `Rc<RefCell<…>>` is enough here: browser WASM is single-threaded and the
//! map is only shared across async boundaries, never across threads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use web_sys::IdbDatabase;

use satchel_core::schema::DatabaseSchema;

use crate::error::Result;
use crate::idb::{self, PendingOpen};

/// Per-database connection slots, keyed by database name.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    slots: RefCell<HashMap<String, Slot>>,
}

#[derive(Debug)]
enum Slot {
    /// Native open in flight; racing callers await a clone of this promise.
    Pending(PendingOpen),
    Open(IdbDatabase),
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared registry handle for injection into bridges.
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    /// Open `schema.name`, reusing the cached connection and sharing any
    /// pending native open. An already-open connection at a lower version
    /// than requested is closed and reopened (it would block the upgrade).
    pub async fn open(&self, schema: &DatabaseSchema) -> Result<IdbDatabase> {
        // Decide under the borrow; await outside it.
        let shared = {
            let mut slots = self.slots.borrow_mut();
            match slots.get(&schema.name) {
                Some(Slot::Open(db)) => {
                    if db.version() as u32 >= schema.version {
                        return Ok(db.clone());
                    }
                    db.close();
                    slots.remove(&schema.name);
                    None
                }
                Some(Slot::Pending(pending)) => Some(pending.clone()),
                None => None,
            }
        };

        if let Some(pending) = shared {
            return idb::await_open(&pending).await;
        }

        let pending = idb::open_database_request(schema)?;
        self.slots
            .borrow_mut()
            .insert(schema.name.clone(), Slot::Pending(pending.clone()));

        match idb::await_open(&pending).await {
            Ok(db) => {
                self.slots
                    .borrow_mut()
                    .insert(schema.name.clone(), Slot::Open(db.clone()));
                Ok(db)
            }
            Err(err) => {
                self.slots.borrow_mut().remove(&schema.name);
                Err(err)
            }
        }
    }

    /// Close and drop the connection for `name`, if any.
    pub fn evict(&self, name: &str) {
        if let Some(Slot::Open(db)) = self.slots.borrow_mut().remove(name) {
            db.close();
        }
    }

    /// Close and drop every registered connection.
    pub fn close_all(&self) {
        for (_, slot) in self.slots.borrow_mut().drain() {
            if let Slot::Open(db) = slot {
                db.close();
            }
        }
    }

    /// Whether a connection (open or pending) is registered for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}
