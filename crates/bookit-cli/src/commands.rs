//! Subcommand implementations.
//!
//! Each command runs against an [`App`] whose session has already been
//! restored from the device cache.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bookit_catalogue::Catalogue;
use bookit_session::{ProfileUpdate, SessionError, SessionManager, favorites};
use bookit_store::{
    Database, FirestoreConfig, FirestoreRecordStore, LocalCache, RecordStore, SqliteLocalCache,
    SqliteRecordStore,
};
use tracing::{info, warn};

use crate::cli::{BookAction, FavoriteAction, ProfileAction};
use crate::config::{BookitConfig, RemoteConfig};
use crate::helpers::{password_or_prompt, print_book, print_user};

/// Everything a command needs.
pub struct App {
    pub session: SessionManager,
    pub catalogue: Catalogue,
}

impl App {
    /// Open the stores named in `config` and restore the cached session.
    pub async fn open(config: &BookitConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let device = Database::open_and_migrate(config.device_db_path())
            .await
            .context("failed to open device cache")?;
        let cache: Arc<dyn LocalCache> = Arc::new(SqliteLocalCache::new(device));
        let store = open_record_store(config).await?;

        let session = SessionManager::new(store, cache, config.session.clone())?;
        let catalogue = match &config.catalogue_path {
            Some(path) => Catalogue::from_path(path)?,
            None => Catalogue::builtin()?,
        };

        let app = Self { session, catalogue };
        match app.session.restore_session().await {
            Ok(Some(user)) => info!(user_id = %user.id, "restored session"),
            Ok(None) => {}
            // Commands that need a session will report it themselves.
            Err(err) => warn!(error = %err, "could not restore session"),
        }
        Ok(app)
    }
}

async fn open_record_store(config: &BookitConfig) -> Result<Arc<dyn RecordStore>> {
    match &config.remote {
        RemoteConfig::Sqlite { .. } => {
            let path = config.records_db_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create directory {}", parent.display())
                })?;
            }
            let db = Database::open_and_migrate(path.clone())
                .await
                .with_context(|| format!("failed to open record store {}", path.display()))?;
            info!(path = %path.display(), "sqlite record store ready");
            Ok(Arc::new(SqliteRecordStore::new(db)))
        }
        RemoteConfig::Firestore {
            project_id,
            api_key,
            base_url,
        } => {
            let mut firestore = FirestoreConfig::new(project_id.clone());
            firestore.api_key = api_key.clone();
            if let Some(url) = base_url {
                firestore.base_url = url.clone();
            }
            let store = FirestoreRecordStore::new(firestore)
                .context("failed to set up firestore client")?;
            info!(project = %project_id, "firestore record store ready");
            Ok(Arc::new(store))
        }
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

pub async fn cmd_register(
    app: &App,
    name: String,
    email: String,
    password: Option<String>,
    confirm_password: Option<String>,
) -> Result<()> {
    let password = password_or_prompt(password, "Password")?;
    let confirm = password_or_prompt(confirm_password, "Confirm password")?;
    if password != confirm {
        bail!("passwords do not match");
    }

    let user = app.session.register(&name, &email, &password).await?;
    println!("  Welcome, {}! Your account has been created.", user.name);
    Ok(())
}

pub async fn cmd_login(app: &App, email: String, password: Option<String>) -> Result<()> {
    let password = password_or_prompt(password, "Password")?;
    let user = app.session.login(&email, &password).await?;
    println!("  Logged in as {} <{}>", user.name, user.email);
    Ok(())
}

pub async fn cmd_logout(app: &App) -> Result<()> {
    let was_logged_in = app.session.is_authenticated();
    app.session.logout().await?;
    if was_logged_in {
        println!("  Logged out.");
    } else {
        println!("  Not logged in.");
    }
    Ok(())
}

pub fn cmd_whoami(app: &App) -> Result<()> {
    match app.session.current() {
        Some(user) => print_user(&user),
        None => println!("  Not logged in."),
    }
    Ok(())
}

pub async fn cmd_refresh(app: &App) -> Result<()> {
    let user = app.session.refresh().await?;
    print_user(&user);
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

pub fn cmd_books(app: &App, action: BookAction) -> Result<()> {
    match action {
        BookAction::List => {
            for book in app.catalogue.all() {
                print_book(book);
            }
        }
        BookAction::Search { query } => {
            let found = app.catalogue.search(&query);
            if found.is_empty() {
                println!("  No books match \"{query}\".");
            }
            for book in found {
                print_book(book);
            }
        }
        BookAction::Show { name } => {
            let book = app
                .catalogue
                .get(&name)
                .with_context(|| format!("no book named \"{name}\""))?;
            print_book(book);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Favorites
// ---------------------------------------------------------------------------

pub async fn cmd_favorites(app: &App, action: FavoriteAction) -> Result<()> {
    let user = match action {
        FavoriteAction::List => {
            let user = app.session.current().ok_or(SessionError::NoActiveSession)?;
            print_favorites(app, &user.favorites);
            return Ok(());
        }
        FavoriteAction::Add { name } => {
            require_book(app, &name)?;
            app.session.add_favorite(&name).await?
        }
        FavoriteAction::Remove { name } => app.session.remove_favorite(&name).await?,
        FavoriteAction::Toggle { name } => {
            let user = app.session.current().ok_or(SessionError::NoActiveSession)?;
            if !favorites::contains(&user.favorites, &name) {
                require_book(app, &name)?;
            }
            app.session.toggle_favorite(&name).await?
        }
        FavoriteAction::Set { names } => {
            app.session.update_favorites(names).await?;
            app.session.current().ok_or(SessionError::NoActiveSession)?
        }
    };

    print_favorites(app, &user.favorites);
    Ok(())
}

fn require_book(app: &App, name: &str) -> Result<()> {
    if app.catalogue.get(name).is_none() {
        bail!("no book named \"{name}\"");
    }
    Ok(())
}

fn print_favorites(app: &App, favorites: &[String]) {
    if favorites.is_empty() {
        println!("  No favorites added yet.");
        return;
    }

    let known = app.catalogue.resolve(favorites);
    for book in &known {
        print_book(book);
    }
    let unknown = favorites.len() - known.len();
    if unknown > 0 {
        println!("  ({unknown} favorite(s) no longer in the catalogue)");
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

pub async fn cmd_profile(app: &App, action: ProfileAction) -> Result<()> {
    match action {
        ProfileAction::Update { name, email } => {
            let current = app.session.current().ok_or(SessionError::NoActiveSession)?;
            let update = ProfileUpdate {
                name: name.unwrap_or(current.name),
                email: email.unwrap_or(current.email),
            };
            let user = app.session.update_profile(update).await?;
            print_user(&user);
        }
    }
    Ok(())
}

// ── tests ────────────────────────────────────────────────────────────
