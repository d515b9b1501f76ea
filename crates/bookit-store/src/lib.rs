//! # bookit-store
//!
//! Persistence for BookiT.
//!
//! Two kinds of storage sit behind traits so the session layer can be
//! tested against fakes and pointed at different backends:
//!
//! ```text
//! ┌──────────────────────────────┬─────────────────────────────┐
//! │ RecordStore (remote, shared) │ LocalCache (device, 1 user) │
//! ├───────────────┬──────────────┼─────────────────────────────┤
//! │ SqliteRecord- │ Firestore-   │ SqliteLocalCache            │
//! │ Store         │ RecordStore  │                             │
//! ├───────────────┴──────────────┴─────────────────────────────┤
//! │ Database (rusqlite WAL) + versioned migrations             │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Passwords are hashed with [`PasswordHasher`] before they reach any
//! store.
//!
//! ## Quick start
//!
//! ```ignore
//! use bookit_store::{Database, SqliteLocalCache, SqliteRecordStore};
//!
//! let db = Database::open_and_migrate("data/records.db").await?;
//! let records = SqliteRecordStore::new(db.clone());
//! let cache = SqliteLocalCache::new(Database::open_and_migrate("data/device.db").await?);
//! ```

pub mod db;
pub mod error;
pub mod firestore;
pub mod local_cache;
pub mod migration;
pub mod password;
pub mod record;
pub mod user_store;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use firestore::{FirestoreConfig, FirestoreRecordStore};
pub use local_cache::{LocalCache, SqliteLocalCache};
pub use password::PasswordHasher;
pub use record::{NewUser, RecordStore, StoredCredentials, UserRecord};
pub use user_store::SqliteRecordStore;
