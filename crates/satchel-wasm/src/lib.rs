//! satchel demo application (browser WASM)
//!
//! A contact-book CRUD service exercising the typed store facade, exported
//! to JavaScript through wasm-bindgen. This crate is the composition root:
//! it creates the connection registry, injects it into the bridge, and
//! holds the open store in thread-local state.
//!
//! # Example (JavaScript)
//!
//! ```js
//! import init, { init_app, add_contact, contacts_in_city } from './pkg/satchel_wasm.js';
//!
//! await init();
//! await init_app();
//!
//! await add_contact(JSON.stringify({ name: "Ada", city: "London" }));
//! const inLondon = JSON.parse(await contacts_in_city("London"));
//! ```

pub mod app;

pub use app::Contact;
