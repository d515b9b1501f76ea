//! Error types for the session manager.
//!
//! Every session operation surfaces failures through [`SessionError`]. No
//! variant is retried internally; the caller decides what to show.

use bookit_store::StoreError;

use crate::guard::Operation;

/// Unified error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Registration found an existing record with the same email.
    #[error("email already registered")]
    DuplicateEmail,

    /// No record matched the email with a verifying password.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The operation needs a logged-in user.
    #[error("no user is logged in")]
    NoActiveSession,

    /// A call to the remote record store failed. Local state is unchanged.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Reading or writing the local cache failed.
    #[error("local cache unavailable: {0}")]
    CacheUnavailable(#[source] StoreError),

    /// Input was rejected before any store was contacted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The same kind of operation is already running.
    #[error("{0} already in progress")]
    OperationInFlight(Operation),

    /// A background task or configuration problem unrelated to the stores.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// A short message suitable for showing to an end user. Each kind maps
    /// to a distinct string.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::DuplicateEmail => "Email already exists",
            Self::InvalidCredentials => "Invalid email or password",
            Self::NoActiveSession => "No user logged in",
            Self::StoreUnavailable(_) => "Could not reach the server, please try again",
            Self::CacheUnavailable(_) => "Could not save data on this device",
            Self::InvalidInput(_) => "Please check the details you entered",
            Self::OperationInFlight(_) => "Please wait, a request is already in progress",
            Self::Internal(_) => "Something went wrong",
        }
    }
}

impl From<tokio::task::JoinError> for SessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {err}"))
    }
}

/// Convenience alias used throughout this crate.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
