//! Client error types.

use calodoro_providers::{AuthError, CalendarError, StoreError};
use calodoro_timer::TimerError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Calendar(#[from] CalendarError),

    #[error("secret storage error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Timer(#[from] TimerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no event with id '{0}' on today's calendar")]
    UnknownEvent(String),

    #[error("not signed in; run `calodoro auth login` first")]
    SignInRequired,
}
