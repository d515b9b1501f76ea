//! The session manager.
//!
//! [`SessionManager`] is the only component that writes user data. It holds
//! three copies of the current user in step:
//!
//! ```text
//!   RecordStore (remote, authoritative)
//!        │  1. write first; on failure nothing local changes
//!        ▼
//!   memory (watch channel observed by the UI)
//!        │  2. updated once the remote write succeeded
//!        ▼
//!   LocalCache (key "user", JSON)
//!        3. written last; failure handled per CacheWritePolicy
//! ```
//!
//! The cache is only read by [`SessionManager::restore_session`], which
//! trusts it without contacting the remote store.

use std::sync::Arc;

use bookit_store::{LocalCache, NewUser, PasswordHasher, RecordStore, StoreError, UserRecord};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::error::{SessionError, SessionResult};
use crate::favorites;
use crate::guard::{InFlight, Operation};
use crate::state::{CacheWritePolicy, SessionConfig, SessionState};

/// New values for the editable profile fields.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
}

/// Owns the current session and keeps store, cache and memory consistent.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct SessionManager {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn LocalCache>,
    hasher: PasswordHasher,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    in_flight: InFlight,
}

impl SessionManager {
    /// Create a manager in the `Anonymous` state. Call
    /// [`restore_session`](Self::restore_session) afterwards to pick up a
    /// cached login.
    pub fn new(
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn LocalCache>,
        config: SessionConfig,
    ) -> SessionResult<Self> {
        let hasher = PasswordHasher::new(config.password_iterations)
            .map_err(|e| SessionError::Internal(format!("invalid session config: {e}")))?;
        let (state, _) = watch::channel(SessionState::Anonymous);

        Ok(Self {
            store,
            cache,
            hasher,
            config,
            state,
            in_flight: InFlight::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    /// The logged-in user, if any.
    pub fn current(&self) -> Option<UserRecord> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Receiver that is notified whenever the in-memory session changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    // -----------------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------------

    /// Create a new account and log it in.
    ///
    /// One remote read (email check) and one remote write. The email check
    /// is not atomic with the insert, so two processes registering the same
    /// email at once can both succeed.
    ///
    /// # Errors
    ///
    /// [`SessionError::DuplicateEmail`] if the email is taken,
    /// [`SessionError::InvalidInput`] for an empty email or password,
    /// [`SessionError::StoreUnavailable`] if either remote call fails.
    ///
    /// Under [`CacheWritePolicy::Strict`] a failed device write returns
    /// [`SessionError::CacheUnavailable`] even though the account exists and
    /// the session is already `Authenticated` in memory.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> SessionResult<UserRecord> {
        let _guard = self.in_flight.acquire(Operation::Register)?;

        if email.trim().is_empty() {
            return Err(SessionError::InvalidInput("email must not be empty".into()));
        }
        if password.is_empty() {
            return Err(SessionError::InvalidInput(
                "password must not be empty".into(),
            ));
        }

        let taken = self
            .store
            .email_exists(email)
            .await
            .map_err(SessionError::StoreUnavailable)?;
        if taken {
            debug!("registration rejected, email already in use");
            return Err(SessionError::DuplicateEmail);
        }

        let password_hash = self.hash_password(password).await?;
        let record = self
            .store
            .insert(NewUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash,
            })
            .await
            .map_err(SessionError::StoreUnavailable)?;

        info!(user_id = %record.id, "user registered");
        self.authenticate(record).await
    }

    /// Log in with email and password.
    ///
    /// Every record with this email is tried, oldest first; the first whose
    /// password verifies becomes the session.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidCredentials`] if no record matches both email
    /// and password.
    ///
    /// Under [`CacheWritePolicy::Strict`] a failed device write returns
    /// [`SessionError::CacheUnavailable`] while the session is already
    /// `Authenticated` in memory.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> SessionResult<UserRecord> {
        let _guard = self.in_flight.acquire(Operation::Login)?;

        let candidates = self
            .store
            .find_credentials(email)
            .await
            .map_err(SessionError::StoreUnavailable)?;
        if candidates.is_empty() {
            debug!("login rejected, unknown email");
            return Err(SessionError::InvalidCredentials);
        }

        for credentials in candidates {
            if self
                .verify_password(password, credentials.password_hash)
                .await?
            {
                info!(user_id = %credentials.record.id, "user logged in");
                return self.authenticate(credentials.record).await;
            }
        }

        debug!("login rejected, wrong password");
        Err(SessionError::InvalidCredentials)
    }

    /// Clear the session and the cached user. Calling it while logged out
    /// is a no-op apart from removing any stray cache entry.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> SessionResult<()> {
        let _guard = self.in_flight.acquire(Operation::Logout)?;

        let previous = self.state.send_replace(SessionState::Anonymous);
        if let Some(user) = previous.user() {
            info!(user_id = %user.id, "user logged out");
        }

        match self.cache.remove(&self.config.cache_key).await {
            Ok(_) => Ok(()),
            Err(err) => self.on_cache_failure(err, false).await,
        }
    }

    /// Load the cached user into memory without contacting the remote store.
    ///
    /// A cache entry that no longer parses is logged, removed, and treated
    /// as absent.
    #[instrument(skip(self))]
    pub async fn restore_session(&self) -> SessionResult<Option<UserRecord>> {
        let _guard = self.in_flight.acquire(Operation::Restore)?;

        let Some(raw) = self
            .cache
            .get(&self.config.cache_key)
            .await
            .map_err(SessionError::CacheUnavailable)?
        else {
            debug!("no cached session");
            return Ok(None);
        };

        match serde_json::from_str::<UserRecord>(&raw) {
            Ok(record) => {
                info!(user_id = %record.id, "session restored from local cache");
                self.state
                    .send_replace(SessionState::Authenticated(record.clone()));
                Ok(Some(record))
            }
            Err(err) => {
                warn!(%err, "cached session is corrupt, discarding");
                if let Err(err) = self.cache.remove(&self.config.cache_key).await {
                    warn!(%err, "failed to remove corrupt cache entry");
                }
                Ok(None)
            }
        }
    }

    /// Re-read the current user from the remote store and overwrite memory
    /// and cache with it.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoActiveSession`] when logged out, or when the remote
    /// record has disappeared (the session is cleared in that case).
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> SessionResult<UserRecord> {
        let _guard = self.in_flight.acquire(Operation::Refresh)?;
        let user = self.current().ok_or(SessionError::NoActiveSession)?;

        let remote = self
            .store
            .get(&user.id)
            .await
            .map_err(SessionError::StoreUnavailable)?;

        match remote {
            Some(record) => {
                let applied = self
                    .apply_local(&user.id, |current| *current = record.clone())
                    .await?;
                debug!(user_id = %user.id, "session refreshed from record store");
                Ok(applied.unwrap_or(record))
            }
            None => {
                warn!(user_id = %user.id, "remote record missing, clearing session");
                self.state.send_if_modified(|state| {
                    let same = state.user().is_some_and(|u| u.id == user.id);
                    if same {
                        *state = SessionState::Anonymous;
                    }
                    same
                });
                if let Err(err) = self.cache.remove(&self.config.cache_key).await {
                    warn!(%err, "failed to clear cached user");
                }
                Err(SessionError::NoActiveSession)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Replace the favorites list wholesale. The caller passes the complete
    /// desired list; nothing is merged or deduplicated.
    #[instrument(skip(self, favorites), fields(count = favorites.len()))]
    pub async fn update_favorites(&self, favorites: Vec<String>) -> SessionResult<()> {
        let _guard = self.in_flight.acquire(Operation::UpdateFavorites)?;
        self.write_favorites(favorites).await.map(|_| ())
    }

    /// Append `item` to the favorites (duplicates allowed).
    #[instrument(skip(self))]
    pub async fn add_favorite(&self, item: &str) -> SessionResult<UserRecord> {
        let _guard = self.in_flight.acquire(Operation::UpdateFavorites)?;
        let user = self.current().ok_or(SessionError::NoActiveSession)?;
        self.write_favorites(favorites::with_added(&user.favorites, item))
            .await
    }

    /// Remove every occurrence of `item` from the favorites.
    #[instrument(skip(self))]
    pub async fn remove_favorite(&self, item: &str) -> SessionResult<UserRecord> {
        let _guard = self.in_flight.acquire(Operation::UpdateFavorites)?;
        let user = self.current().ok_or(SessionError::NoActiveSession)?;
        self.write_favorites(favorites::without(&user.favorites, item))
            .await
    }

    /// Remove `item` if it is a favorite, otherwise append it.
    #[instrument(skip(self))]
    pub async fn toggle_favorite(&self, item: &str) -> SessionResult<UserRecord> {
        let _guard = self.in_flight.acquire(Operation::UpdateFavorites)?;
        let user = self.current().ok_or(SessionError::NoActiveSession)?;
        self.write_favorites(favorites::toggled(&user.favorites, item))
            .await
    }

    /// Change name and email.
    ///
    /// Email uniqueness is not re-checked here, unlike in
    /// [`register`](Self::register).
    ///
    /// # Errors
    ///
    /// [`SessionError::NoActiveSession`] when logged out, checked before
    /// anything else. [`SessionError::InvalidInput`] for a blank email, since
    /// a record without an email could never log in again.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: ProfileUpdate) -> SessionResult<UserRecord> {
        let _guard = self.in_flight.acquire(Operation::UpdateProfile)?;
        let user = self.current().ok_or(SessionError::NoActiveSession)?;

        if update.email.trim().is_empty() {
            return Err(SessionError::InvalidInput("email must not be empty".into()));
        }
        self.store
            .update_profile(&user.id, &update.name, &update.email)
            .await
            .map_err(SessionError::StoreUnavailable)?;

        let expected = UserRecord {
            name: update.name.clone(),
            email: update.email.clone(),
            ..user.clone()
        };
        let applied = self
            .apply_local(&user.id, move |current| {
                current.name = update.name;
                current.email = update.email;
            })
            .await?;

        info!(user_id = %user.id, "profile updated");
        Ok(applied.unwrap_or(expected))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Remote write of the full list, then memory and cache. Callers hold
    /// the `UpdateFavorites` guard.
    async fn write_favorites(&self, favorites: Vec<String>) -> SessionResult<UserRecord> {
        let user = self.current().ok_or(SessionError::NoActiveSession)?;

        self.store
            .update_favorites(&user.id, &favorites)
            .await
            .map_err(SessionError::StoreUnavailable)?;
        debug!(user_id = %user.id, count = favorites.len(), "favorites written");

        let expected = UserRecord {
            favorites: favorites.clone(),
            ..user.clone()
        };
        let applied = self
            .apply_local(&user.id, move |current| current.favorites = favorites)
            .await?;
        Ok(applied.unwrap_or(expected))
    }

    /// Set `record` as the current session and cache it.
    async fn authenticate(&self, record: UserRecord) -> SessionResult<UserRecord> {
        self.state
            .send_replace(SessionState::Authenticated(record.clone()));
        self.write_cache(&record).await?;
        Ok(record)
    }

    /// Apply `change` to the in-memory user if it is still `id`, then write
    /// the result to the cache. Returns `None` when the session moved on
    /// (logout or another login) while the remote write was in flight.
    async fn apply_local<F>(&self, id: &str, change: F) -> SessionResult<Option<UserRecord>>
    where
        F: FnOnce(&mut UserRecord) + Send,
    {
        let mut updated = None;
        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated(user) if user.id == id => {
                change(user);
                updated = Some(user.clone());
                true
            }
            _ => false,
        });

        match updated {
            Some(record) => {
                self.write_cache(&record).await?;
                Ok(Some(record))
            }
            None => {
                debug!(user_id = id, "session changed during update, local copy left as is");
                Ok(None)
            }
        }
    }

    async fn write_cache(&self, record: &UserRecord) -> SessionResult<()> {
        let value = serde_json::to_string(record)
            .map_err(|e| SessionError::CacheUnavailable(StoreError::from(e)))?;

        match self.cache.set(&self.config.cache_key, &value).await {
            Ok(()) => {
                debug!(user_id = %record.id, "session cached");
                Ok(())
            }
            Err(err) => self.on_cache_failure(err, true).await,
        }
    }

    /// Handle a cache failure that happened after memory was updated.
    async fn on_cache_failure(&self, err: StoreError, purge: bool) -> SessionResult<()> {
        match self.config.cache_write_policy {
            CacheWritePolicy::Strict => {
                warn!(%err, "local cache write failed");
                // A stale entry would restore an outdated user next start.
                if purge {
                    if let Err(remove_err) = self.cache.remove(&self.config.cache_key).await {
                        warn!(err = %remove_err, "failed to drop stale cache entry");
                    }
                }
                Err(SessionError::CacheUnavailable(err))
            }
            CacheWritePolicy::BestEffort => {
                warn!(%err, "local cache write failed, continuing");
                Ok(())
            }
        }
    }

    async fn hash_password(&self, password: &str) -> SessionResult<String> {
        let hasher = self.hasher;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await?
            .map_err(|e| SessionError::Internal(format!("password hashing failed: {e}")))
    }

    async fn verify_password(&self, password: &str, stored: String) -> SessionResult<bool> {
        let hasher = self.hasher;
        let password = password.to_string();
        let result = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored)).await?;

        match result {
            Ok(valid) => Ok(valid),
            Err(err) => {
                // Legacy plaintext or otherwise unreadable values never match.
                warn!(%err, "stored password hash is unreadable");
                Ok(false)
            }
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────
