//! Core types: timer session model, sync requests, time windows, tracing

pub mod session;
pub mod time;
pub mod tracing;

pub use session::{
    EventBinding, SyncRequest, TimerMode, TimerPhase, TimerState, UNTITLED_TASK, normalize_title,
};
pub use time::{TimeWindow, format_clock};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
