//! Focus session model shared by the timer and the calendar sync.
//!
//! A focus session moves through three orthogonal axes:
//!
//! - [`TimerMode`]: Pomodoro cycles or a plain open-ended count-up
//! - [`TimerPhase`]: Work or Rest (Rest only exists in Pomodoro mode)
//! - [`TimerState`]: Idle, Running or Paused
//!
//! When a session is finalized it produces at most one [`SyncRequest`],
//! describing the work interval that should be mirrored onto the calendar.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Title used when the user did not name the task.
pub const UNTITLED_TASK: &str = "Untitled Task";

/// How the timer counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Fixed work intervals followed by breaks, counting down.
    #[default]
    Pomodoro,
    /// Open-ended count-up with no breaks.
    #[serde(alias = "timer")]
    Plain,
}

impl TimerMode {
    /// Returns the label shown to users.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Pomodoro => "Pomodoro",
            Self::Plain => "Timer",
        }
    }
}

impl fmt::Display for TimerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pomodoro" => Ok(Self::Pomodoro),
            "plain" | "timer" => Ok(Self::Plain),
            other => Err(format!(
                "unknown timer mode '{}' (expected 'pomodoro' or 'timer')",
                other
            )),
        }
    }
}

/// The active phase of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerPhase {
    #[default]
    Work,
    Rest,
}

/// Run state of the timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    #[default]
    Idle,
    Running,
    Paused,
}

impl TimerState {
    /// Returns true while a session exists (running or paused).
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

/// A remote calendar event a session is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBinding {
    /// Provider-assigned event identifier.
    pub event_id: String,
    /// Whether the event is an all-day placeholder.
    pub is_all_day: bool,
}

impl EventBinding {
    pub fn new(event_id: impl Into<String>, is_all_day: bool) -> Self {
        Self {
            event_id: event_id.into(),
            is_all_day,
        }
    }
}

/// The calendar mutation derived from one finalized session.
///
/// Produced once per finalized session with accumulated work, consumed once
/// by the sync coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Event to update; `None` means a new event is created.
    pub event_id: Option<String>,
    /// Event title (used when creating).
    pub title: String,
    /// Start of the work interval.
    pub start: DateTime<Utc>,
    /// End of the work interval.
    pub end: DateTime<Utc>,
    /// Whether the bound event was an all-day placeholder.
    pub was_all_day: bool,
}

impl SyncRequest {
    /// Creates a request for a new, unbound event.
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            event_id: None,
            title: title.into(),
            start,
            end,
            was_all_day: false,
        }
    }

    /// Attaches the request to an existing event, if any.
    pub fn with_binding(mut self, binding: Option<&EventBinding>) -> Self {
        if let Some(binding) = binding {
            self.event_id = Some(binding.event_id.clone());
            self.was_all_day = binding.is_all_day;
        }
        self
    }

    /// Length of the work interval.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Returns true when the interval has no positive length.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Trims a task title, falling back to [`UNTITLED_TASK`] when blank.
pub fn normalize_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        UNTITLED_TASK.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, h, m, s).unwrap()
    }

    #[test]
    fn mode_parsing() {
        assert_eq!("pomodoro".parse::<TimerMode>(), Ok(TimerMode::Pomodoro));
        assert_eq!("Timer".parse::<TimerMode>(), Ok(TimerMode::Plain));
        assert_eq!(" plain ".parse::<TimerMode>(), Ok(TimerMode::Plain));
        assert!("stopwatch".parse::<TimerMode>().is_err());
    }

    #[test]
    fn mode_serde_accepts_timer_alias() {
        let mode: TimerMode = serde_json::from_str("\"timer\"").unwrap();
        assert_eq!(mode, TimerMode::Plain);
        assert_eq!(serde_json::to_string(&TimerMode::Plain).unwrap(), "\"plain\"");
    }

    #[test]
    fn title_normalization() {
        assert_eq!(normalize_title("  Write report \n"), "Write report");
        assert_eq!(normalize_title("   "), UNTITLED_TASK);
        assert_eq!(normalize_title(""), UNTITLED_TASK);
    }

    #[test]
    fn sync_request_binding() {
        let binding = EventBinding::new("evt-1", true);
        let request =
            SyncRequest::new("Focus", utc(9, 0, 0), utc(9, 25, 0)).with_binding(Some(&binding));

        assert_eq!(request.event_id.as_deref(), Some("evt-1"));
        assert!(request.was_all_day);
        assert_eq!(request.duration(), Duration::minutes(25));
        assert!(!request.is_empty());
    }

    #[test]
    fn sync_request_without_binding() {
        let request = SyncRequest::new("Focus", utc(9, 0, 0), utc(9, 0, 0)).with_binding(None);
        assert!(request.event_id.is_none());
        assert!(!request.was_all_day);
        assert!(request.is_empty());
    }

    #[test]
    fn state_activity() {
        assert!(!TimerState::Idle.is_active());
        assert!(TimerState::Running.is_active());
        assert!(TimerState::Paused.is_active());
    }
}
