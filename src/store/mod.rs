//! Key-value state store.
//!
//! A single SQLite table holds the authoritative workspace state:
//!
//! ```sql
//! CREATE TABLE state (
//!     key TEXT PRIMARY KEY,       -- images | pages | pageCount
//!     value TEXT NOT NULL,        -- JSON document
//!     updated_at INTEGER NOT NULL -- unix millis of the last write
//! );
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cld::store::{StateKey, StateStore};
//!
//! let store = StateStore::open("state.db")?;
//! store.set(StateKey::PageCount, &2)?;
//! let watermark = store.last_modified()?;
//! ```

mod db;
mod entry;

pub use db::StateStore;
pub use entry::{StateDump, StateEntry, StateKey};
