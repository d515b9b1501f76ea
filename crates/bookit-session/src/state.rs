//! Session state and configuration.

use bookit_store::UserRecord;
use serde::Deserialize;

/// Who is logged in.
///
/// `register`/`login` move to `Authenticated`; `logout` moves to
/// `Anonymous`; favorites and profile updates stay in `Authenticated`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(UserRecord),
}

impl SessionState {
    pub fn user(&self) -> Option<&UserRecord> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// What to do when the local cache write fails after the remote write
/// already succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheWritePolicy {
    /// Drop the stale cache entry (best-effort) and return
    /// `CacheUnavailable`. Memory still reflects the remote record.
    #[default]
    Strict,
    /// Log a warning and report success.
    BestEffort,
}

/// Tunables for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Local cache key holding the serialized current user.
    pub cache_key: String,
    pub cache_write_policy: CacheWritePolicy,
    /// PBKDF2 rounds for newly hashed passwords.
    pub password_iterations: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_key: "user".to_string(),
            cache_write_policy: CacheWritePolicy::Strict,
            password_iterations: bookit_store::password::DEFAULT_ITERATIONS,
        }
    }
}
