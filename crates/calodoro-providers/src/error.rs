//! Error types for authentication, calendar and sync operations.
//!
//! Every error maps onto an [`ErrorKind`], a coarse classification used by
//! callers to decide how to react (re-offer sign-in, force sign-out, show a
//! sync failure next to an otherwise finished session, ...). Nothing in this
//! crate retries on its own.

use std::fmt;
use thiserror::Error;

/// The category of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid client configuration. Fatal to sign-in.
    Configuration,
    /// The user dismissed the interactive sign-in.
    UserCanceled,
    /// Malformed callback, missing code, unexpected response shape.
    Protocol,
    /// The authorization, token or calendar endpoint answered with an error.
    Provider,
    /// No credential, or one that can no longer be refreshed.
    NotAuthenticated,
    /// A calendar mutation failed after the session was finalized.
    SyncFailure,
    /// The secret store could not be read or written.
    Storage,
    /// Connection failed, timed out or the body could not be read.
    Network,
    /// Unexpected local failure.
    Internal,
}

impl ErrorKind {
    /// Returns true if repeating the same call might succeed.
    ///
    /// Informational only: no code path in this crate retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Returns a machine-readable name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::UserCanceled => "user_canceled",
            Self::Protocol => "protocol",
            Self::Provider => "provider",
            Self::NotAuthenticated => "not_authenticated",
            Self::SyncFailure => "sync_failure",
            Self::Storage => "storage",
            Self::Network => "network",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by a secret store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("secret store I/O error for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The OS secret service refused the operation.
    #[error("secret store backend error: {0}")]
    Backend(String),

    /// The stored record could not be encoded or decoded.
    #[error("stored credential is unreadable: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            key: key.into(),
            source,
        }
    }
}

/// Errors from the sign-in flow and the token lifecycle.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Google OAuth configuration")]
    MissingConfiguration,

    #[error("Invalid auth callback")]
    InvalidCallback,

    #[error("Authorization callback timed out")]
    CallbackTimeout,

    #[error("Missing authorization code")]
    MissingAuthCode,

    #[error("Sign-in canceled")]
    UserCanceled,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Token refresh failed")]
    TokenRefreshFailed,

    /// The callback carried an `error` parameter.
    #[error("OAuth error: {0}")]
    OAuthError(String),

    /// The token endpoint rejected the authorization code.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    /// The browser session could not be presented.
    #[error("could not present authorization: {0}")]
    Presentation(String),

    #[error("token storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AuthError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingConfiguration => ErrorKind::Configuration,
            Self::UserCanceled => ErrorKind::UserCanceled,
            Self::InvalidCallback
            | Self::CallbackTimeout
            | Self::MissingAuthCode
            | Self::InvalidResponse(_) => ErrorKind::Protocol,
            Self::OAuthError(_) | Self::TokenExchangeFailed(_) | Self::TokenRefreshFailed => {
                ErrorKind::Provider
            }
            Self::NotAuthenticated => ErrorKind::NotAuthenticated,
            Self::Network(_) => ErrorKind::Network,
            Self::Presentation(_) => ErrorKind::Internal,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }
}

/// Errors from the calendar API.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// No bearer token could be obtained.
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Calendar API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Calendar event id missing")]
    MissingEventId,

    #[error("Calendar API response invalid")]
    InvalidResponse,

    #[error("network error: {0}")]
    Network(String),
}

impl CalendarError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(inner) => inner.kind(),
            Self::Api { .. } => ErrorKind::Provider,
            Self::MissingEventId | Self::InvalidResponse => ErrorKind::Protocol,
            Self::Network(_) => ErrorKind::Network,
        }
    }

    /// Returns the HTTP status for API errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A calendar mutation that failed after a session was finalized.
#[derive(Debug, Error)]
#[error("Calendar sync failed: {source}")]
pub struct SyncError {
    #[from]
    source: CalendarError,
}

impl SyncError {
    /// Always [`ErrorKind::SyncFailure`].
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SyncFailure
    }

    /// The gateway error behind this failure.
    pub fn cause(&self) -> &CalendarError {
        &self.source
    }
}

/// Result alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Result alias for calendar operations.
pub type CalendarResult<T> = Result<T, CalendarError>;

/// Result alias for secret store operations.
pub type StoreResult<T> = Result<T, StoreError>;
