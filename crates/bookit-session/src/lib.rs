//! # bookit-session
//!
//! Account and session handling for BookiT.
//!
//! [`SessionManager`] implements register, login, logout, favorites and
//! profile updates, and restoring a session on startup. It writes to the
//! remote [`RecordStore`](bookit_store::RecordStore) first, then memory,
//! then the device [`LocalCache`](bookit_store::LocalCache), so a failed
//! remote call never leaves the local copies ahead of the server.
//!
//! ```ignore
//! let manager = SessionManager::new(records, cache, SessionConfig::default())?;
//! manager.restore_session().await?;
//! manager.login("ada@x.com", "pw1").await?;
//! manager.add_favorite("Dune").await?;
//! ```

pub mod error;
pub mod favorites;
pub mod guard;
pub mod manager;
pub mod state;

pub use error::{SessionError, SessionResult};
pub use guard::Operation;
pub use manager::{ProfileUpdate, SessionManager};
pub use state::{CacheWritePolicy, SessionConfig, SessionState};
