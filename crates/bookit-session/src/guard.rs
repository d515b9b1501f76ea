//! Per-operation in-flight guards.
//!
//! A second call of the same operation kind while the first is still
//! awaiting the stores is rejected with
//! [`SessionError::OperationInFlight`] rather than queued, so a
//! double-submitted form cannot register twice or interleave two favorites
//! writes. Different kinds do not block each other.

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{SessionError, SessionResult};

/// The kinds of session operation that are guarded independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Login,
    Logout,
    /// Also covers add/remove/toggle, which write the same field.
    UpdateFavorites,
    UpdateProfile,
    Refresh,
    Restore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::UpdateFavorites => "update favorites",
            Self::UpdateProfile => "update profile",
            Self::Refresh => "refresh",
            Self::Restore => "restore session",
        };
        f.write_str(name)
    }
}

/// Set of operation kinds currently running.
#[derive(Debug, Default)]
pub struct InFlight {
    running: Mutex<HashSet<Operation>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `op` as running until the returned guard is dropped.
    pub fn acquire(&self, op: Operation) -> SessionResult<InFlightGuard<'_>> {
        let mut running = self
            .running
            .lock()
            .map_err(|e| SessionError::Internal(format!("in-flight mutex poisoned: {e}")))?;

        if !running.insert(op) {
            debug!(operation = %op, "rejecting concurrent call");
            return Err(SessionError::OperationInFlight(op));
        }

        Ok(InFlightGuard { owner: self, op })
    }
}

/// Releases its operation kind on drop, including when the future holding
/// it is dropped mid-await.
#[must_use]
pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    op: Operation,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut running) = self.owner.running.lock() {
            running.remove(&self.op);
        }
    }
}
