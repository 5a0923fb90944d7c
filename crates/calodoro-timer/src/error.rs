//! Timer error types.

use thiserror::Error;

/// Errors raised by the focus timer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// `start` was called while a session is running or paused.
    #[error("A focus session is already active")]
    SessionActive,

    /// The controller task has exited.
    #[error("Focus controller is not running")]
    ControllerClosed,
}

pub type TimerResult<T> = Result<T, TimerError>;
