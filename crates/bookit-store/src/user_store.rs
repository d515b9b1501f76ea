//! SQLite-backed [`RecordStore`].
//!
//! Stands in for the hosted document database when running locally or in
//! tests. Favorites are stored as a JSON array in a TEXT column.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};
use crate::record::{NewUser, RecordStore, StoredCredentials, UserRecord};

const SELECT_COLUMNS: &str = "SELECT id, name, email, favorites, password_hash FROM users";

/// User documents kept in the `users` table.
#[derive(Clone)]
pub struct SqliteRecordStore {
    db: Database,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Number of records with exactly this email.
    #[instrument(skip(self))]
    pub async fn count_by_email(&self, email: &str) -> StoreResult<i64> {
        let email = email.to_string();
        self.db
            .execute(move |conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE email = ?1",
                    rusqlite::params![email],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self))]
    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        Ok(self.count_by_email(email).await? > 0)
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().timestamp();

        let record = UserRecord {
            id: id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            favorites: Vec::new(),
        };

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO users (id, name, email, password_hash, favorites, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, '[]', ?5, ?5)",
                    rusqlite::params![id, user.name, user.email, user.password_hash, now],
                )?;
                Ok(())
            })
            .await?;

        debug!(user_id = %record.id, "user record inserted");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn find_credentials(&self, email: &str) -> StoreResult<Vec<StoredCredentials>> {
        let email = email.to_string();
        self.db
            .execute(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("{SELECT_COLUMNS} WHERE email = ?1 ORDER BY rowid ASC"))?;
                let rows = stmt
                    .query_map(rusqlite::params![email], UserRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(UserRow::into_credentials).collect()
            })
            .await
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let row = conn
                    .query_row(
                        &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                        rusqlite::params![id],
                        UserRow::from_row,
                    )
                    .optional()?;
                row.map(|r| r.into_credentials().map(|c| c.record))
                    .transpose()
            })
            .await
    }

    #[instrument(skip(self, favorites), fields(count = favorites.len()))]
    async fn update_favorites(&self, id: &str, favorites: &[String]) -> StoreResult<()> {
        let id = id.to_string();
        let favorites = serde_json::to_string(favorites)?;
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE users SET favorites = ?2, updated_at = ?3 WHERE id = ?1",
                    rusqlite::params![id, favorites, now],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound { entity: "user", id });
                }
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn update_profile(&self, id: &str, name: &str, email: &str) -> StoreResult<()> {
        let id = id.to_string();
        let name = name.to_string();
        let email = email.to_string();
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                let updated = conn.execute(
                    "UPDATE users SET name = ?2, email = ?3, updated_at = ?4 WHERE id = ?1",
                    rusqlite::params![id, name, email, now],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound { entity: "user", id });
                }
                Ok(())
            })
            .await
    }
}

// ── row mapping ──────────────────────────────────────────────────────

struct UserRow {
    id: String,
    name: String,
    email: String,
    favorites: String,
    password_hash: String,
}

impl UserRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            favorites: row.get(3)?,
            password_hash: row.get(4)?,
        })
    }

    fn into_credentials(self) -> StoreResult<StoredCredentials> {
        let favorites: Vec<String> = serde_json::from_str(&self.favorites)?;
        Ok(StoredCredentials {
            record: UserRecord {
                id: self.id,
                name: self.name,
                email: self.email,
                favorites,
            },
            password_hash: self.password_hash,
        })
    }
}

// ── tests ────────────────────────────────────────────────────────────
