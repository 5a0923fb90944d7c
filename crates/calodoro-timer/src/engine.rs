//! The focus session state machine.
//!
//! [`TimerEngine`] is driven entirely from the outside: explicit
//! start/pause/resume/stop calls and one [`TimerEngine::tick`] per elapsed
//! second. It performs no I/O; phase changes and finalized sessions are
//! returned to the caller, which decides whether to notify or sync.

use calodoro_core::{
    EventBinding, SyncRequest, TimerMode, TimerPhase, TimerState, format_clock, normalize_title,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{TimerError, TimerResult};

pub const DEFAULT_POMODORO_MINUTES: u32 = 25;
pub const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;

/// User preferences that shape a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSettings {
    /// Length of a Pomodoro work phase.
    pub pomodoro_minutes: u32,
    /// Length of the break after a work phase; 0 skips breaks.
    pub short_break_minutes: u32,
    /// Master switch for phase-end notifications.
    pub notifications_enabled: bool,
    pub work_end_notifications: bool,
    pub break_end_notifications: bool,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            pomodoro_minutes: DEFAULT_POMODORO_MINUTES,
            short_break_minutes: DEFAULT_SHORT_BREAK_MINUTES,
            notifications_enabled: true,
            work_end_notifications: true,
            break_end_notifications: false,
        }
    }
}

impl TimerSettings {
    pub fn with_pomodoro_minutes(mut self, minutes: u32) -> Self {
        self.pomodoro_minutes = minutes;
        self
    }

    pub fn with_short_break_minutes(mut self, minutes: u32) -> Self {
        self.short_break_minutes = minutes;
        self
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }

    pub fn with_work_end_notifications(mut self, enabled: bool) -> Self {
        self.work_end_notifications = enabled;
        self
    }

    pub fn with_break_end_notifications(mut self, enabled: bool) -> Self {
        self.break_end_notifications = enabled;
        self
    }

    pub fn work_seconds(&self) -> u64 {
        u64::from(self.pomodoro_minutes) * 60
    }

    pub fn break_seconds(&self) -> u64 {
        u64::from(self.short_break_minutes) * 60
    }

    /// Whether a phase change should raise a notification.
    pub fn should_notify(&self, change: &PhaseChange) -> bool {
        self.notifications_enabled
            && match change {
                PhaseChange::WorkEnded { .. } => self.work_end_notifications,
                PhaseChange::BreakEnded => self.break_end_notifications,
            }
    }
}

/// An automatic phase boundary reached by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseChange {
    /// A work phase ran out. `next` is `Rest`, or `Work` when breaks are off.
    WorkEnded { next: TimerPhase },
    /// A break ran out and a new work phase began.
    BreakEnded,
}

/// Observable state of the engine at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub phase: TimerPhase,
    pub state: TimerState,
    pub title: String,
    pub binding: Option<EventBinding>,
    pub elapsed_seconds: u64,
    pub accumulated_work_seconds: u64,
    pub display_seconds: u64,
    pub clock: String,
    pub status: &'static str,
}

impl TimerSnapshot {
    /// Short label for a status line: the app name while idle, the clock
    /// otherwise.
    pub fn label(&self) -> String {
        match self.state {
            TimerState::Idle => "Calodoro".to_string(),
            TimerState::Running => self.clock.clone(),
            TimerState::Paused => format!("Paused {}", self.clock),
        }
    }
}

/// Work/break session state machine.
#[derive(Debug, Clone)]
pub struct TimerEngine {
    settings: TimerSettings,
    mode: TimerMode,
    phase: TimerPhase,
    state: TimerState,
    /// Seconds in the current phase.
    elapsed: u64,
    /// Target length of the current phase; 0 means open-ended.
    duration: u64,
    accumulated_work: u64,
    title: String,
    binding: Option<EventBinding>,
    session_start: Option<DateTime<Utc>>,
}

impl TimerEngine {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings,
            mode: TimerMode::default(),
            phase: TimerPhase::Work,
            state: TimerState::Idle,
            elapsed: 0,
            duration: 0,
            accumulated_work: 0,
            title: String::new(),
            binding: None,
            session_start: None,
        }
    }

    pub fn with_mode(mut self, mode: TimerMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    /// Replaces the settings. Phase lengths apply from the next phase.
    pub fn set_settings(&mut self, settings: TimerSettings) {
        self.settings = settings;
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed
    }

    pub fn accumulated_work_seconds(&self) -> u64 {
        self.accumulated_work
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn binding(&self) -> Option<&EventBinding> {
        self.binding.as_ref()
    }

    pub fn session_start(&self) -> Option<DateTime<Utc>> {
        self.session_start
    }

    /// Switches between Pomodoro and Plain. Only allowed while idle.
    pub fn set_mode(&mut self, mode: TimerMode) -> bool {
        if self.state != TimerState::Idle {
            return false;
        }
        self.mode = mode;
        true
    }

    /// Begins a session at `now`.
    pub fn start(
        &mut self,
        title: &str,
        binding: Option<EventBinding>,
        now: DateTime<Utc>,
    ) -> TimerResult<()> {
        if self.state != TimerState::Idle {
            return Err(TimerError::SessionActive);
        }

        self.reset();
        self.title = normalize_title(title);
        self.binding = binding;
        self.session_start = Some(now);
        self.begin_phase(TimerPhase::Work);
        self.state = TimerState::Running;

        info!(
            mode = %self.mode,
            title = %self.title,
            event_id = self.binding.as_ref().map(|b| b.event_id.as_str()).unwrap_or_default(),
            "focus session started"
        );
        Ok(())
    }

    pub fn pause(&mut self) -> bool {
        if self.state != TimerState::Running {
            return false;
        }
        self.state = TimerState::Paused;
        debug!(elapsed = self.elapsed, "session paused");
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != TimerState::Paused {
            return false;
        }
        self.state = TimerState::Running;
        debug!(elapsed = self.elapsed, "session resumed");
        true
    }

    /// Finalizes the session and returns to idle.
    ///
    /// Returns the calendar mutation for the session when any work time was
    /// accumulated. Time spent in a break is dropped.
    pub fn stop(&mut self) -> Option<SyncRequest> {
        if self.state == TimerState::Idle {
            return None;
        }

        if self.mode == TimerMode::Plain || self.phase == TimerPhase::Work {
            self.accumulated_work += self.elapsed;
        }

        let request = match self.session_start {
            Some(start) if self.accumulated_work > 0 => {
                let end = start + Duration::seconds(self.accumulated_work as i64);
                Some(
                    SyncRequest::new(self.title.clone(), start, end)
                        .with_binding(self.binding.as_ref()),
                )
            }
            _ => None,
        };

        info!(
            work_seconds = self.accumulated_work,
            sync = request.is_some(),
            "focus session finished"
        );
        self.reset();
        request
    }

    /// Advances the session by one second.
    ///
    /// Ignored unless running. Returns the phase boundary crossed, if any.
    pub fn tick(&mut self) -> Option<PhaseChange> {
        if self.state != TimerState::Running {
            return None;
        }

        self.elapsed += 1;

        if self.mode != TimerMode::Pomodoro || self.duration == 0 || self.elapsed < self.duration {
            return None;
        }

        let change = match self.phase {
            TimerPhase::Work => {
                self.accumulated_work += self.elapsed;
                let next = if self.settings.break_seconds() > 0 {
                    TimerPhase::Rest
                } else {
                    TimerPhase::Work
                };
                self.begin_phase(next);
                PhaseChange::WorkEnded { next }
            }
            TimerPhase::Rest => {
                self.begin_phase(TimerPhase::Work);
                PhaseChange::BreakEnded
            }
        };

        info!(
            ?change,
            work_seconds = self.accumulated_work,
            "phase finished"
        );
        Some(change)
    }

    /// Seconds to show: remaining time in Pomodoro, elapsed time in Plain.
    pub fn display_seconds(&self) -> u64 {
        match self.mode {
            TimerMode::Plain => self.elapsed,
            TimerMode::Pomodoro => {
                let target = if self.state == TimerState::Idle {
                    self.settings.work_seconds()
                } else {
                    self.duration
                };
                target.saturating_sub(self.elapsed)
            }
        }
    }

    pub fn clock(&self) -> String {
        format_clock(self.display_seconds())
    }

    pub fn status_text(&self) -> &'static str {
        match (self.state, self.mode, self.phase) {
            (TimerState::Idle, TimerMode::Pomodoro, _) => "Ready to focus",
            (TimerState::Idle, TimerMode::Plain, _) => "Ready to time",
            (TimerState::Paused, _, _) => "Paused",
            (TimerState::Running, TimerMode::Plain, _) => "Timing",
            (TimerState::Running, TimerMode::Pomodoro, TimerPhase::Work) => "Focusing",
            (TimerState::Running, TimerMode::Pomodoro, TimerPhase::Rest) => "Break",
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            mode: self.mode,
            phase: self.phase,
            state: self.state,
            title: self.title.clone(),
            binding: self.binding.clone(),
            elapsed_seconds: self.elapsed,
            accumulated_work_seconds: self.accumulated_work,
            display_seconds: self.display_seconds(),
            clock: self.clock(),
            status: self.status_text(),
        }
    }

    fn begin_phase(&mut self, phase: TimerPhase) {
        self.phase = phase;
        self.elapsed = 0;
        self.duration = match (self.mode, phase) {
            (TimerMode::Plain, _) => 0,
            (TimerMode::Pomodoro, TimerPhase::Work) => self.settings.work_seconds(),
            (TimerMode::Pomodoro, TimerPhase::Rest) => self.settings.break_seconds(),
        };
    }

    fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.phase = TimerPhase::Work;
        self.elapsed = 0;
        self.duration = 0;
        self.accumulated_work = 0;
        self.title.clear();
        self.binding = None;
        self.session_start = None;
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(TimerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn ticks(engine: &mut TimerEngine, n: u64) -> Vec<PhaseChange> {
        (0..n).filter_map(|_| engine.tick()).collect()
    }

    fn short_settings() -> TimerSettings {
        TimerSettings::default()
            .with_pomodoro_minutes(1)
            .with_short_break_minutes(1)
    }

    #[test]
    fn default_settings() {
        let settings = TimerSettings::default();
        assert_eq!(settings.work_seconds(), 1500);
        assert_eq!(settings.break_seconds(), 300);
        assert!(settings.notifications_enabled);
        assert!(settings.work_end_notifications);
        assert!(!settings.break_end_notifications);
    }

    #[test]
    fn start_runs_work_phase() {
        let mut engine = TimerEngine::default();
        engine.start("  Write report ", None, t0()).unwrap();

        assert_eq!(engine.state(), TimerState::Running);
        assert_eq!(engine.phase(), TimerPhase::Work);
        assert_eq!(engine.title(), "Write report");
        assert_eq!(engine.session_start(), Some(t0()));
        assert_eq!(engine.display_seconds(), 1500);
    }

    #[test]
    fn start_while_active_is_rejected() {
        let mut engine = TimerEngine::default();
        engine.start("a", None, t0()).unwrap();
        assert!(matches!(
            engine.start("b", None, t0()),
            Err(TimerError::SessionActive)
        ));
        engine.pause();
        assert!(engine.start("b", None, t0()).is_err());
        assert_eq!(engine.title(), "a");
    }

    #[test]
    fn blank_title_becomes_untitled() {
        let mut engine = TimerEngine::default();
        engine.start("   ", None, t0()).unwrap();
        assert_eq!(engine.title(), "Untitled Task");
    }

    #[test]
    fn plain_stop_syncs_elapsed_time() {
        let mut engine = TimerEngine::default().with_mode(TimerMode::Plain);
        engine.start("Write", None, t0()).unwrap();
        assert!(ticks(&mut engine, 125).is_empty());
        assert_eq!(engine.display_seconds(), 125);

        let request = engine.stop().unwrap();
        assert_eq!(request.title, "Write");
        assert_eq!(request.start, t0());
        assert_eq!(request.end, t0() + Duration::seconds(125));
        assert_eq!(request.event_id, None);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn plain_mode_never_changes_phase() {
        let mut engine = TimerEngine::new(short_settings()).with_mode(TimerMode::Plain);
        engine.start("Write", None, t0()).unwrap();
        assert!(ticks(&mut engine, 3600).is_empty());
        assert_eq!(engine.phase(), TimerPhase::Work);
        assert_eq!(engine.status_text(), "Timing");
        assert_eq!(engine.clock(), "01:00:00");
    }

    #[test]
    fn stop_during_rest_discards_break_time() {
        let mut engine = TimerEngine::new(short_settings());
        engine.start("Write", None, t0()).unwrap();

        let changes = ticks(&mut engine, 60);
        assert_eq!(
            changes,
            vec![PhaseChange::WorkEnded {
                next: TimerPhase::Rest
            }]
        );
        assert_eq!(engine.phase(), TimerPhase::Rest);
        assert_eq!(engine.status_text(), "Break");

        ticks(&mut engine, 30);
        let request = engine.stop().unwrap();
        assert_eq!(request.duration(), Duration::seconds(60));
    }

    #[test]
    fn rest_end_starts_new_work_phase_without_syncing() {
        let mut engine = TimerEngine::new(short_settings());
        engine.start("Write", None, t0()).unwrap();

        let changes = ticks(&mut engine, 120);
        assert_eq!(
            changes,
            vec![
                PhaseChange::WorkEnded {
                    next: TimerPhase::Rest
                },
                PhaseChange::BreakEnded,
            ]
        );
        assert_eq!(engine.phase(), TimerPhase::Work);
        assert_eq!(engine.accumulated_work_seconds(), 60);

        ticks(&mut engine, 10);
        let request = engine.stop().unwrap();
        assert_eq!(request.duration(), Duration::seconds(70));
    }

    #[test]
    fn zero_break_skips_rest() {
        let settings = short_settings().with_short_break_minutes(0);
        let mut engine = TimerEngine::new(settings);
        engine.start("Write", None, t0()).unwrap();

        let changes = ticks(&mut engine, 120);
        assert_eq!(
            changes,
            vec![
                PhaseChange::WorkEnded {
                    next: TimerPhase::Work
                };
                2
            ]
        );
        assert_eq!(engine.phase(), TimerPhase::Work);
        assert_eq!(engine.accumulated_work_seconds(), 120);
    }

    #[test]
    fn zero_length_work_phase_counts_up_forever() {
        let settings = TimerSettings::default().with_pomodoro_minutes(0);
        let mut engine = TimerEngine::new(settings);
        engine.start("Write", None, t0()).unwrap();
        assert!(ticks(&mut engine, 500).is_empty());
        assert_eq!(engine.display_seconds(), 0);
        assert_eq!(engine.stop().unwrap().duration(), Duration::seconds(500));
    }

    #[test]
    fn paused_engine_ignores_ticks() {
        let mut engine = TimerEngine::default();
        engine.start("Write", None, t0()).unwrap();
        ticks(&mut engine, 10);

        assert!(engine.pause());
        assert!(!engine.pause());
        ticks(&mut engine, 50);
        assert_eq!(engine.elapsed_seconds(), 10);
        assert_eq!(engine.status_text(), "Paused");
        assert_eq!(engine.snapshot().label(), "Paused 24:50");

        assert!(engine.resume());
        assert!(!engine.resume());
        ticks(&mut engine, 5);
        assert_eq!(engine.elapsed_seconds(), 15);
    }

    #[test]
    fn idle_engine_is_inert() {
        let mut engine = TimerEngine::default();
        assert_eq!(engine.tick(), None);
        assert!(!engine.pause());
        assert!(!engine.resume());
        assert_eq!(engine.stop(), None);
        assert_eq!(engine.display_seconds(), 1500);
        assert_eq!(engine.status_text(), "Ready to focus");
    }

    #[test]
    fn stop_without_work_produces_nothing() {
        let mut engine = TimerEngine::default();
        engine.start("Write", None, t0()).unwrap();
        assert_eq!(engine.stop(), None);
        assert_eq!(engine.state(), TimerState::Idle);
    }

    #[test]
    fn stop_resets_session() {
        let mut engine = TimerEngine::default();
        engine
            .start("Write", Some(EventBinding::new("evt-1", false)), t0())
            .unwrap();
        ticks(&mut engine, 42);
        engine.stop();

        assert_eq!(engine.elapsed_seconds(), 0);
        assert_eq!(engine.accumulated_work_seconds(), 0);
        assert_eq!(engine.binding(), None);
        assert_eq!(engine.session_start(), None);
        assert_eq!(engine.phase(), TimerPhase::Work);
        // a second stop is a no-op
        assert_eq!(engine.stop(), None);
    }

    #[test]
    fn bound_placeholder_produces_conversion_request() {
        let mut engine = TimerEngine::default();
        engine
            .start("Write", Some(EventBinding::new("evt-9", true)), t0())
            .unwrap();
        ticks(&mut engine, 90);

        let request = engine.stop().unwrap();
        assert_eq!(request.event_id.as_deref(), Some("evt-9"));
        assert!(request.was_all_day);
        assert_eq!(request.end, t0() + Duration::seconds(90));
    }

    #[test]
    fn paused_stop_in_work_phase_keeps_elapsed() {
        let mut engine = TimerEngine::default();
        engine.start("Write", None, t0()).unwrap();
        ticks(&mut engine, 20);
        engine.pause();

        assert_eq!(engine.stop().unwrap().duration(), Duration::seconds(20));
    }

    #[test]
    fn mode_changes_only_while_idle() {
        let mut engine = TimerEngine::default();
        assert!(engine.set_mode(TimerMode::Plain));
        assert_eq!(engine.status_text(), "Ready to time");
        assert_eq!(engine.display_seconds(), 0);

        engine.start("Write", None, t0()).unwrap();
        assert!(!engine.set_mode(TimerMode::Pomodoro));
        assert_eq!(engine.mode(), TimerMode::Plain);
    }

    #[test]
    fn notification_gating() {
        let work = PhaseChange::WorkEnded {
            next: TimerPhase::Rest,
        };
        let settings = TimerSettings::default();
        assert!(settings.should_notify(&work));
        assert!(!settings.should_notify(&PhaseChange::BreakEnded));

        let settings = settings.with_break_end_notifications(true);
        assert!(settings.should_notify(&PhaseChange::BreakEnded));

        let settings = settings.with_notifications(false);
        assert!(!settings.should_notify(&work));
        assert!(!settings.should_notify(&PhaseChange::BreakEnded));
    }

    #[test]
    fn snapshot_while_running() {
        let mut engine = TimerEngine::default();
        engine.start("Write", None, t0()).unwrap();
        ticks(&mut engine, 61);

        insta::assert_json_snapshot!(engine.snapshot(), @r###"
        {
          "mode": "pomodoro",
          "phase": "work",
          "state": "running",
          "title": "Write",
          "binding": null,
          "elapsed_seconds": 61,
          "accumulated_work_seconds": 0,
          "display_seconds": 1439,
          "clock": "23:59",
          "status": "Focusing"
        }
        "###);
        assert_eq!(engine.snapshot().label(), "23:59");
    }
}
