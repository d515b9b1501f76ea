//! Integration tests for the bookit-session crate.
//!
//! The session manager runs against SQLite-backed stores wrapped in fakes
//! that can fail, count calls, or pause mid-request, so the ordering rules
//! between remote store, memory and local cache can be observed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bookit_session::{
    CacheWritePolicy, Operation, ProfileUpdate, SessionConfig, SessionError, SessionManager,
};
use bookit_store::{
    Database, LocalCache, NewUser, RecordStore, SqliteLocalCache, SqliteRecordStore, StoreError,
    StoreResult, StoredCredentials, UserRecord,
};
use tokio::sync::Notify;

// ═══════════════════════════════════════════════════════════════════════
//  Fakes
// ═══════════════════════════════════════════════════════════════════════

fn unavailable() -> StoreError {
    StoreError::Remote {
        status: 503,
        message: "UNAVAILABLE".into(),
    }
}

/// Pauses a store call until released.
#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// Record store over SQLite with switchable faults.
struct FakeStore {
    inner: SqliteRecordStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    record_missing: AtomicBool,
    calls: AtomicUsize,
    gate: Option<Arc<Gate>>,
}

impl FakeStore {
    fn new(db: Database) -> Self {
        Self {
            inner: SqliteRecordStore::new(db),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            record_missing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    fn gated(db: Database, gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(db)
        }
    }

    fn read(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    fn write(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(())
    }

    async fn maybe_wait(&self) {
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn email_exists(&self, email: &str) -> StoreResult<bool> {
        self.read()?;
        self.maybe_wait().await;
        self.inner.email_exists(email).await
    }

    async fn insert(&self, user: NewUser) -> StoreResult<UserRecord> {
        self.write()?;
        self.inner.insert(user).await
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Vec<StoredCredentials>> {
        self.read()?;
        self.inner.find_credentials(email).await
    }

    async fn get(&self, id: &str) -> StoreResult<Option<UserRecord>> {
        self.read()?;
        if self.record_missing.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get(id).await
    }

    async fn update_favorites(&self, id: &str, favorites: &[String]) -> StoreResult<()> {
        self.write()?;
        self.maybe_wait().await;
        self.inner.update_favorites(id, favorites).await
    }

    async fn update_profile(&self, id: &str, name: &str, email: &str) -> StoreResult<()> {
        self.write()?;
        self.inner.update_profile(id, name, email).await
    }
}

/// Local cache over SQLite whose reads and writes can be made to fail.
/// `remove` always works.
struct FakeCache {
    inner: SqliteLocalCache,
    fail_get: AtomicBool,
    fail_set: AtomicBool,
}

impl FakeCache {
    fn new(db: Database) -> Self {
        Self {
            inner: SqliteLocalCache::new(db),
            fail_get: AtomicBool::new(false),
            fail_set: AtomicBool::new(false),
        }
    }

    async fn cached_user(&self) -> Option<UserRecord> {
        self.inner
            .get("user")
            .await
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }
}

#[async_trait]
impl LocalCache for FakeCache {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidArgument("disk unreadable".into()));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidArgument("disk full".into()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> StoreResult<bool> {
        self.inner.remove(key).await
    }
}

struct Harness {
    manager: Arc<SessionManager>,
    store: Arc<FakeStore>,
    cache: Arc<FakeCache>,
}

async fn memory_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().await.unwrap();
    db
}

fn config(policy: CacheWritePolicy) -> SessionConfig {
    SessionConfig {
        cache_write_policy: policy,
        password_iterations: 1_000,
        ..SessionConfig::default()
    }
}

async fn harness_with(store: FakeStore, policy: CacheWritePolicy) -> Harness {
    let store = Arc::new(store);
    let cache = Arc::new(FakeCache::new(memory_db().await));
    let manager = SessionManager::new(store.clone(), cache.clone(), config(policy)).unwrap();
    Harness {
        manager: Arc::new(manager),
        store,
        cache,
    }
}

async fn harness(policy: CacheWritePolicy) -> Harness {
    harness_with(FakeStore::new(memory_db().await), policy).await
}

// ═══════════════════════════════════════════════════════════════════════
//  Remote failures leave local state alone
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn register_remote_failure_changes_nothing() {
    let h = harness(CacheWritePolicy::Strict).await;
    h.store.fail_writes.store(true, Ordering::SeqCst);

    let err = h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap_err();
    assert!(matches!(err, SessionError::StoreUnavailable(_)));
    assert!(!h.manager.is_authenticated());
    assert!(h.cache.cached_user().await.is_none());
}

#[tokio::test]
async fn login_remote_failure_is_store_unavailable() {
    let h = harness(CacheWritePolicy::Strict).await;
    h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap();
    h.manager.logout().await.unwrap();

    h.store.fail_reads.store(true, Ordering::SeqCst);
    let err = h.manager.login("ada@x.com", "pw1").await.unwrap_err();
    assert!(matches!(err, SessionError::StoreUnavailable(_)));
    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn favorites_remote_failure_keeps_memory_and_cache() {
    let h = harness(CacheWritePolicy::Strict).await;
    let ada = h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap();
    h.manager.add_favorite("Dune").await.unwrap();

    h.store.fail_writes.store(true, Ordering::SeqCst);
    let err = h
        .manager
        .update_favorites(vec!["Emma".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::StoreUnavailable(_)));

    assert_eq!(h.manager.current().unwrap().favorites, vec!["Dune"]);
    assert_eq!(h.cache.cached_user().await.unwrap().favorites, vec!["Dune"]);
    assert_eq!(
        h.store.inner.get(&ada.id).await.unwrap().unwrap().favorites,
        vec!["Dune"]
    );
}

#[tokio::test]
async fn profile_remote_failure_keeps_memory() {
    let h = harness(CacheWritePolicy::Strict).await;
    h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap();

    h.store.fail_writes.store(true, Ordering::SeqCst);
    let err = h
        .manager
        .update_profile(ProfileUpdate {
            name: "Changed".into(),
            email: "changed@x.com".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::StoreUnavailable(_)));
    assert_eq!(h.manager.current().unwrap().email, "ada@x.com");
    assert_eq!(h.cache.cached_user().await.unwrap().email, "ada@x.com");
}

// ═══════════════════════════════════════════════════════════════════════
//  Cache failures
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn strict_cache_failure_reports_and_drops_stale_entry() {
    let h = harness(CacheWritePolicy::Strict).await;
    let ada = h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap();

    h.cache.fail_set.store(true, Ordering::SeqCst);
    let err = h
        .manager
        .update_favorites(vec!["Dune".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CacheUnavailable(_)));

    // Remote and memory moved on; the outdated cache entry is gone.
    assert_eq!(
        h.store.inner.get(&ada.id).await.unwrap().unwrap().favorites,
        vec!["Dune"]
    );
    assert_eq!(h.manager.current().unwrap().favorites, vec!["Dune"]);
    assert!(h.cache.cached_user().await.is_none());
}

#[tokio::test]
async fn strict_cache_failure_on_login_leaves_session_authenticated() {
    let h = harness(CacheWritePolicy::Strict).await;
    h.cache.fail_set.store(true, Ordering::SeqCst);

    let err = h
        .manager
        .register("Ada", "ada@x.com", "pw1")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::CacheUnavailable(_)));
    assert_eq!(h.manager.current().unwrap().email, "ada@x.com");
    assert!(h.store.inner.email_exists("ada@x.com").await.unwrap());

    h.manager.logout().await.unwrap();
    let err = h.manager.login("ada@x.com", "pw1").await.unwrap_err();
    assert!(matches!(err, SessionError::CacheUnavailable(_)));
    assert!(h.manager.is_authenticated());
    assert!(h.cache.cached_user().await.is_none());
}

#[tokio::test]
async fn best_effort_cache_failure_succeeds() {
    let h = harness(CacheWritePolicy::BestEffort).await;
    h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap();

    h.cache.fail_set.store(true, Ordering::SeqCst);
    h.manager.update_favorites(vec!["Dune".into()]).await.unwrap();

    assert_eq!(h.manager.current().unwrap().favorites, vec!["Dune"]);
    assert!(h.cache.cached_user().await.unwrap().favorites.is_empty());
}

#[tokio::test]
async fn restore_cache_read_failure_is_cache_unavailable() {
    let h = harness(CacheWritePolicy::Strict).await;
    h.cache.fail_get.store(true, Ordering::SeqCst);

    let err = h.manager.restore_session().await.unwrap_err();
    assert!(matches!(err, SessionError::CacheUnavailable(_)));
    assert!(!h.manager.is_authenticated());
}

#[tokio::test]
async fn restore_never_contacts_remote() {
    let h = harness(CacheWritePolicy::Strict).await;
    h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap();

    let restarted = SessionManager::new(
        h.store.clone(),
        h.cache.clone(),
        config(CacheWritePolicy::Strict),
    )
    .unwrap();
    let before = h.store.calls.load(Ordering::SeqCst);
    h.store.fail_reads.store(true, Ordering::SeqCst);

    let restored = restarted.restore_session().await.unwrap().unwrap();
    assert_eq!(restored.email, "ada@x.com");
    assert_eq!(h.store.calls.load(Ordering::SeqCst), before);
}

// ═══════════════════════════════════════════════════════════════════════
//  Concurrency
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn concurrent_register_is_rejected() {
    let gate = Arc::new(Gate::default());
    let store = FakeStore::gated(memory_db().await, gate.clone());
    let h = harness_with(store, CacheWritePolicy::Strict).await;

    let manager = h.manager.clone();
    let first =
        tokio::spawn(async move { manager.register("Ada", "ada@x.com", "pw1").await });
    gate.entered.notified().await;

    let err = h
        .manager
        .register("Ada", "ada@x.com", "pw1")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SessionError::OperationInFlight(Operation::Register)
    ));

    gate.release.notify_one();
    let ada = first.await.unwrap().unwrap();
    assert_eq!(h.manager.current(), Some(ada));
    assert_eq!(h.store.inner.count_by_email("ada@x.com").await.unwrap(), 1);

    // The guard is released once the first call finished.
    let manager = h.manager.clone();
    let second =
        tokio::spawn(async move { manager.register("Bob", "bob@x.com", "pw2").await });
    gate.entered.notified().await;
    gate.release.notify_one();
    assert_eq!(second.await.unwrap().unwrap().name, "Bob");
}

#[tokio::test]
async fn logout_during_favorites_write_wins_locally() {
    let gate = Arc::new(Gate::default());
    let store = FakeStore::gated(memory_db().await, gate.clone());
    let h = harness_with(store, CacheWritePolicy::Strict).await;

    // Register without the gate in the way.
    let manager = h.manager.clone();
    let register =
        tokio::spawn(async move { manager.register("Ada", "ada@x.com", "pw1").await });
    gate.entered.notified().await;
    gate.release.notify_one();
    let ada = register.await.unwrap().unwrap();

    let manager = h.manager.clone();
    let update =
        tokio::spawn(async move { manager.update_favorites(vec!["Dune".into()]).await });
    gate.entered.notified().await;

    h.manager.logout().await.unwrap();
    gate.release.notify_one();
    update.await.unwrap().unwrap();

    // The remote write landed but the logged-out session stays empty.
    assert!(!h.manager.is_authenticated());
    assert!(h.cache.cached_user().await.is_none());
    assert_eq!(
        h.store.inner.get(&ada.id).await.unwrap().unwrap().favorites,
        vec!["Dune"]
    );
}

// ═══════════════════════════════════════════════════════════════════════
//  Refresh
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn refresh_with_missing_record_clears_session() {
    let h = harness(CacheWritePolicy::Strict).await;
    h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap();

    h.store.record_missing.store(true, Ordering::SeqCst);
    let err = h.manager.refresh().await.unwrap_err();
    assert!(matches!(err, SessionError::NoActiveSession));
    assert!(!h.manager.is_authenticated());
    assert!(h.cache.cached_user().await.is_none());
}

#[tokio::test]
async fn refresh_remote_failure_keeps_session() {
    let h = harness(CacheWritePolicy::Strict).await;
    h.manager.register("Ada", "ada@x.com", "pw1").await.unwrap();

    h.store.fail_reads.store(true, Ordering::SeqCst);
    let err = h.manager.refresh().await.unwrap_err();
    assert!(matches!(err, SessionError::StoreUnavailable(_)));
    assert!(h.manager.is_authenticated());
}

// ═══════════════════════════════════════════════════════════════════════
//  On-disk restart
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn session_survives_process_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let records_path = dir.path().join("records.db");
    let device_path = dir.path().join("device.db");

    let ada = {
        let records = Database::open_and_migrate(records_path.clone()).await.unwrap();
        let device = Database::open_and_migrate(device_path.clone()).await.unwrap();
        let manager = SessionManager::new(
            Arc::new(SqliteRecordStore::new(records)),
            Arc::new(SqliteLocalCache::new(device)),
            config(CacheWritePolicy::Strict),
        )
        .unwrap();
        manager.register("Ada", "ada@x.com", "pw1").await.unwrap();
        manager.add_favorite("Dune").await.unwrap()
    };

    let records = Database::open_and_migrate(records_path).await.unwrap();
    let device = Database::open_and_migrate(device_path).await.unwrap();
    let manager = SessionManager::new(
        Arc::new(SqliteRecordStore::new(records)),
        Arc::new(SqliteLocalCache::new(device)),
        config(CacheWritePolicy::Strict),
    )
    .unwrap();

    let restored = manager.restore_session().await.unwrap().unwrap();
    assert_eq!(restored, ada);

    manager.logout().await.unwrap();
    assert!(manager.restore_session().await.unwrap().is_none());
    manager.login("ada@x.com", "pw1").await.unwrap();
    assert_eq!(manager.current().unwrap().favorites, vec!["Dune"]);
}
