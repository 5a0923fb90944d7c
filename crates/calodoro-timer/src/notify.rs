//! Phase-end notifications.
//!
//! The controller turns a [`PhaseChange`] into a [`Notice`] and hands it to
//! a [`Notifier`]. [`DesktopNotifier`] shows it through the desktop
//! notification service.

use std::fmt;
use std::time::Duration;

use notify_rust::Notification;
use tracing::{error, info};

use crate::engine::PhaseChange;

/// A notification ready to be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub summary: String,
    pub body: String,
}

impl Notice {
    /// Notice for a finished work phase.
    pub fn work_ended(title: &str) -> Self {
        let body = if title.trim().is_empty() {
            "Time to take a break.".to_string()
        } else {
            format!("Finished: {}", title)
        };
        Self {
            summary: "Pomodoro Complete".to_string(),
            body,
        }
    }

    pub fn break_ended() -> Self {
        Self {
            summary: "Break Complete".to_string(),
            body: "Back to work.".to_string(),
        }
    }

    pub fn for_change(change: &PhaseChange, title: &str) -> Self {
        match change {
            PhaseChange::WorkEnded { .. } => Self::work_ended(title),
            PhaseChange::BreakEnded => Self::break_ended(),
        }
    }
}

/// Local notification sink.
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Shows `notice`. Failures are logged, never returned.
    fn notify(&self, notice: &Notice);
}

/// Shows notices with the desktop notification service.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    app_name: String,
    timeout: Duration,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self {
            app_name: "calodoro".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notice: &Notice) {
        let mut notification = Notification::new();
        notification
            .appname(&self.app_name)
            .summary(&notice.summary)
            .body(&notice.body)
            .timeout(self.timeout);

        match notification.show() {
            Ok(_) => info!(summary = %notice.summary, "notification sent"),
            Err(e) => error!(error = %e, summary = %notice.summary, "failed to send notification"),
        }
    }
}

/// Drops every notice.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _: &Notice) {}
}
