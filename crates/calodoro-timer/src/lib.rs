//! Focus timer: session state machine, tick source, notifications and the
//! controller loop that ties them to calendar sync.

pub mod controller;
pub mod engine;
pub mod error;
pub mod notify;
pub mod sync;
pub mod ticker;

pub use controller::{ControllerCommand, ControllerHandle, FocusController, FocusSnapshot};
pub use engine::{
    DEFAULT_POMODORO_MINUTES, DEFAULT_SHORT_BREAK_MINUTES, PhaseChange, TimerEngine,
    TimerSettings, TimerSnapshot,
};
pub use error::{TimerError, TimerResult};
pub use notify::{DesktopNotifier, NoopNotifier, Notice, Notifier};
pub use sync::SessionSync;
pub use ticker::{TICK_PERIOD, Ticker};
