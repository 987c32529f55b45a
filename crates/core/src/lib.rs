//! Relay
//!
//! A versioned key-value relay: clients append JSON objects under a
//! `(namespace, key)` pair and read them back in insertion order, resuming
//! from the cursor returned by their previous call.
//!
//! # Features
//!
//! - **Store-assigned versions**: every append gets a 12-byte, strictly increasing version
//! - **Resumable reads**: read everything after a cursor, never re-reading or skipping a value
//! - **Hex cursors**: 24 lowercase hex characters that sort like the versions they carry
//! - **Pluggable stores**: in-memory, or SQLite through diesel (`sqlite` feature)
//!
//! # Example
//!
//! ```rust,no_run
//! use relay_core::{ServerOptions, server, store::MemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = ServerOptions {
//!         port: 8082,
//!         ..Default::default()
//!     };
//!
//!     server::start_server(MemoryStore::new(), options).await.unwrap();
//! }
//! ```
//!
//! # Protocol
//!
//! ## Appending a value
//!
//! ```text
//! POST /v1/qs/orders/o1 HTTP/1.1
//! Content-Type: application/json
//!
//! {"status": "new"}
//!
//! Response: 200 OK
//! {"next": "6713a2f0c4e1b9a7d2000001"}
//! ```
//!
//! ## Reading values
//!
//! ```text
//! GET /v1/qs/orders/o1 HTTP/1.1
//!
//! Response: 200 OK
//! {"data": [{"status": "new"}], "next": "6713a2f0c4e1b9a7d2000001"}
//! ```
//!
//! ## Resuming
//!
//! ```text
//! GET /v1/qs/orders/o1?next=6713a2f0c4e1b9a7d2000001 HTTP/1.1
//!
//! Response: 200 OK
//! {"data": [], "next": "6713a2f0c4e1b9a7d2000001"}
//! ```

pub mod cursor;
pub mod error;
pub mod json;
pub mod relay;
pub mod server;
pub mod store;
pub mod version;

// Re-export commonly used items
pub use cursor::{Cursor, CursorError};
pub use error::{ErrorKind, RelayError, Result};
pub use relay::{ReadResult, Relay};
pub use server::{AppState, ServerOptions, create_router, start_server};
pub use store::{Document, MemoryStore, OrderedStore, RecordFilter, StoreError, StoredRecord};
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use version::{Version, VersionError};
