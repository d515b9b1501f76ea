//! User records and the remote record store abstraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// A user as seen by the session layer and the local cache.
///
/// The password hash never leaves the record store, so it is not part of
/// this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Assigned by the record store on insert; immutable afterwards.
    pub id: String,
    pub name: String,
    pub email: String,
    /// Item names in user order. Duplicates are kept.
    #[serde(default)]
    pub favorites: Vec<String>,
}

/// Fields for a record that has not been inserted yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// A record together with its stored password hash, returned only for
/// credential checks.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub record: UserRecord,
    pub password_hash: String,
}

/// The remote collection of user documents.
///
/// Implementations only provide equality lookups and field updates by id;
/// uniqueness and credential rules live in the session layer.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Whether any record has exactly this email.
    async fn email_exists(&self, email: &str) -> StoreResult<bool>;

    /// Insert a new record with an empty favorites list.
    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord>;

    /// Every record whose email matches, oldest first, with its password
    /// hash. More than one only after a registration race.
    async fn find_credentials(&self, email: &str) -> StoreResult<Vec<StoredCredentials>>;

    async fn get(&self, id: &str) -> StoreResult<Option<UserRecord>>;

    /// Replace the favorites list wholesale. `NotFound` for an unknown id.
    async fn update_favorites(&self, id: &str, favorites: &[String]) -> StoreResult<()>;

    /// Overwrite name and email. `NotFound` for an unknown id.
    async fn update_profile(&self, id: &str, name: &str, email: &str) -> StoreResult<()>;
}
