//! Focus controller: the event loop that owns a [`TimerEngine`].
//!
//! The controller runs on a single task and reacts to three event sources:
//! commands from [`ControllerHandle`]s, ticks from its [`Ticker`], and
//! completions of calendar syncs it spawned. Syncs are fire-and-forget; the
//! engine is already idle by the time a sync finishes.

use std::sync::Arc;
use std::time::Duration;

use calodoro_core::{EventBinding, SyncRequest, TimerMode};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::engine::{TimerEngine, TimerSettings, TimerSnapshot};
use crate::error::{TimerError, TimerResult};
use crate::notify::{Notice, Notifier};
use crate::sync::SessionSync;
use crate::ticker::{TICK_PERIOD, Ticker};

/// What observers see: the engine state plus sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusSnapshot {
    pub timer: TimerSnapshot,
    /// Text of the most recent sync failure; cleared by a successful sync or
    /// a new session.
    pub calendar_sync_message: Option<String>,
    /// Syncs spawned and not yet finished.
    pub pending_syncs: usize,
    /// Event touched by the most recent successful sync.
    pub last_synced_event: Option<String>,
}

/// Commands accepted by the controller.
#[derive(Debug)]
pub enum ControllerCommand {
    Start {
        title: String,
        binding: Option<EventBinding>,
        reply: oneshot::Sender<TimerResult<()>>,
    },
    Pause(oneshot::Sender<bool>),
    Resume(oneshot::Sender<bool>),
    Stop(oneshot::Sender<Option<SyncRequest>>),
    SetMode(TimerMode, oneshot::Sender<bool>),
    UpdateSettings(TimerSettings),
    Shutdown,
}

type SyncCompletion = Result<Option<String>, String>;

pub struct FocusController {
    engine: TimerEngine,
    ticker: Ticker,
    notifier: Arc<dyn Notifier>,
    sync: Option<Arc<dyn SessionSync>>,
    command_tx: mpsc::Sender<ControllerCommand>,
    command_rx: mpsc::Receiver<ControllerCommand>,
    tick_rx: mpsc::UnboundedReceiver<u64>,
    done_tx: mpsc::UnboundedSender<SyncCompletion>,
    done_rx: mpsc::UnboundedReceiver<SyncCompletion>,
    snapshot_tx: watch::Sender<FocusSnapshot>,
    calendar_sync_message: Option<String>,
    pending_syncs: usize,
    last_synced_event: Option<String>,
}

impl FocusController {
    pub fn new(settings: TimerSettings, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_tick_period(settings, notifier, TICK_PERIOD)
    }

    pub fn with_tick_period(
        settings: TimerSettings,
        notifier: Arc<dyn Notifier>,
        period: Duration,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let engine = TimerEngine::new(settings);
        let (snapshot_tx, _) = watch::channel(FocusSnapshot {
            timer: engine.snapshot(),
            calendar_sync_message: None,
            pending_syncs: 0,
            last_synced_event: None,
        });

        Self {
            engine,
            ticker: Ticker::with_period(tick_tx, period),
            notifier,
            sync: None,
            command_tx,
            command_rx,
            tick_rx,
            done_tx,
            done_rx,
            snapshot_tx,
            calendar_sync_message: None,
            pending_syncs: 0,
            last_synced_event: None,
        }
    }

    /// Mirrors finalized sessions through `sync`.
    pub fn with_sync(mut self, sync: Arc<dyn SessionSync>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_mode(mut self, mode: TimerMode) -> Self {
        self.engine.set_mode(mode);
        self.publish();
        self
    }

    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            command_tx: self.command_tx.clone(),
            snapshot_rx: self.snapshot_tx.subscribe(),
        }
    }

    /// Runs until [`ControllerHandle::shutdown`] is called or every handle is
    /// dropped.
    pub async fn run(mut self) {
        // Only handles keep the command channel open.
        let (closed_tx, _) = mpsc::channel(1);
        self.command_tx = closed_tx;

        info!(mode = %self.engine.mode(), "focus controller started");

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(ControllerCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd),
                },
                Some(generation) = self.tick_rx.recv() => self.handle_tick(generation),
                Some(done) = self.done_rx.recv() => self.handle_sync_done(done),
            }
            self.publish();
        }

        self.ticker.stop();
        info!("focus controller stopped");
    }

    /// Applies a command. The snapshot is published before replying so a
    /// caller sees its own change.
    fn handle_command(&mut self, cmd: ControllerCommand) {
        match cmd {
            ControllerCommand::Start {
                title,
                binding,
                reply,
            } => {
                let result = self.engine.start(&title, binding, Utc::now());
                if result.is_ok() {
                    self.calendar_sync_message = None;
                    self.ticker.start();
                }
                self.publish();
                let _ = reply.send(result);
            }
            ControllerCommand::Pause(reply) => {
                let paused = self.engine.pause();
                if paused {
                    self.ticker.stop();
                }
                self.publish();
                let _ = reply.send(paused);
            }
            ControllerCommand::Resume(reply) => {
                let resumed = self.engine.resume();
                if resumed {
                    self.ticker.start();
                }
                self.publish();
                let _ = reply.send(resumed);
            }
            ControllerCommand::Stop(reply) => {
                let was_active = self.engine.state().is_active();
                let request = self.engine.stop();
                if was_active {
                    self.ticker.stop();
                }
                if let Some(request) = &request {
                    self.spawn_sync(request.clone());
                }
                self.publish();
                let _ = reply.send(request);
            }
            ControllerCommand::SetMode(mode, reply) => {
                let changed = self.engine.set_mode(mode);
                self.publish();
                let _ = reply.send(changed);
            }
            ControllerCommand::UpdateSettings(settings) => {
                debug!(?settings, "timer settings updated");
                self.engine.set_settings(settings);
            }
            ControllerCommand::Shutdown => {}
        }
    }

    fn handle_tick(&mut self, generation: u64) {
        if generation != self.ticker.generation() {
            debug!(generation, "stale tick ignored");
            return;
        }

        let Some(change) = self.engine.tick() else {
            return;
        };

        if self.engine.settings().should_notify(&change) {
            let notice = Notice::for_change(&change, self.engine.title());
            self.notifier.notify(&notice);
        }
    }

    fn spawn_sync(&mut self, request: SyncRequest) {
        let Some(sync) = self.sync.clone() else {
            debug!("no calendar sync configured");
            return;
        };

        self.pending_syncs += 1;
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result = sync
                .sync_session(&request)
                .await
                .map(|outcome| outcome.event_id().map(str::to_string))
                .map_err(|e| e.to_string());
            let _ = done_tx.send(result);
        });
    }

    fn handle_sync_done(&mut self, done: SyncCompletion) {
        self.pending_syncs = self.pending_syncs.saturating_sub(1);
        match done {
            Ok(event_id) => {
                self.calendar_sync_message = None;
                if event_id.is_some() {
                    self.last_synced_event = event_id;
                }
            }
            Err(message) => {
                warn!(error = %message, "session not mirrored to calendar");
                self.calendar_sync_message = Some(message);
            }
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(FocusSnapshot {
            timer: self.engine.snapshot(),
            calendar_sync_message: self.calendar_sync_message.clone(),
            pending_syncs: self.pending_syncs,
            last_synced_event: self.last_synced_event.clone(),
        });
    }
}

/// Handle for driving a running [`FocusController`].
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    command_tx: mpsc::Sender<ControllerCommand>,
    snapshot_rx: watch::Receiver<FocusSnapshot>,
}

impl ControllerHandle {
    /// Starts a session. Fails with [`TimerError::SessionActive`] unless idle.
    pub async fn start(
        &self,
        title: impl Into<String>,
        binding: Option<EventBinding>,
    ) -> TimerResult<()> {
        let title = title.into();
        self.request(|reply| ControllerCommand::Start {
            title,
            binding,
            reply,
        })
        .await?
    }

    pub async fn pause(&self) -> TimerResult<bool> {
        self.request(ControllerCommand::Pause).await
    }

    pub async fn resume(&self) -> TimerResult<bool> {
        self.request(ControllerCommand::Resume).await
    }

    /// Finalizes the session; returns the sync request that was dispatched.
    pub async fn stop(&self) -> TimerResult<Option<SyncRequest>> {
        self.request(ControllerCommand::Stop).await
    }

    pub async fn set_mode(&self, mode: TimerMode) -> TimerResult<bool> {
        self.request(|reply| ControllerCommand::SetMode(mode, reply))
            .await
    }

    pub async fn update_settings(&self, settings: TimerSettings) -> TimerResult<()> {
        self.command_tx
            .send(ControllerCommand::UpdateSettings(settings))
            .await
            .map_err(|_| TimerError::ControllerClosed)
    }

    pub async fn shutdown(&self) -> TimerResult<()> {
        self.command_tx
            .send(ControllerCommand::Shutdown)
            .await
            .map_err(|_| TimerError::ControllerClosed)
    }

    pub fn snapshot(&self) -> FocusSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FocusSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Waits until no spawned sync is outstanding and returns that snapshot.
    pub async fn settled(&self) -> TimerResult<FocusSnapshot> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|s| s.pending_syncs == 0)
            .await
            .map_err(|_| TimerError::ControllerClosed)?;
        Ok(snapshot.clone())
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControllerCommand,
    ) -> TimerResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| TimerError::ControllerClosed)?;
        reply_rx.await.map_err(|_| TimerError::ControllerClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NoopNotifier;
    use calodoro_core::{TimerPhase, TimerState};
    use calodoro_providers::{BoxFuture, CalendarError, SyncError, SyncOutcome};
    use std::sync::Mutex;
    use tokio::time::sleep;

    #[derive(Debug, Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: &Notice) {
            self.notices.lock().unwrap().push(notice.clone());
        }
    }

    #[derive(Default)]
    struct RecordingSync {
        requests: Mutex<Vec<SyncRequest>>,
        fail: bool,
        delay: Option<Duration>,
    }

    impl SessionSync for RecordingSync {
        fn sync_session<'a>(
            &'a self,
            request: &'a SyncRequest,
        ) -> BoxFuture<'a, Result<SyncOutcome, SyncError>> {
            self.requests.lock().unwrap().push(request.clone());
            Box::pin(async move {
                if let Some(delay) = self.delay {
                    sleep(delay).await;
                }
                if self.fail {
                    Err(SyncError::from(CalendarError::Api {
                        status: 500,
                        message: "backend down".into(),
                    }))
                } else {
                    Ok(SyncOutcome::Created {
                        event_id: "evt-new".into(),
                    })
                }
            })
        }
    }

    fn spawn(controller: FocusController) -> ControllerHandle {
        let handle = controller.handle();
        tokio::spawn(controller.run());
        handle
    }

    fn seconds(n: u64) -> Duration {
        Duration::from_millis(n * 1000 + 500)
    }

    #[tokio::test(start_paused = true)]
    async fn plain_session_syncs_once_with_elapsed_time() {
        let sync = Arc::new(RecordingSync::default());
        let controller = FocusController::new(TimerSettings::default(), Arc::new(NoopNotifier))
            .with_sync(sync.clone())
            .with_mode(TimerMode::Plain);
        let handle = spawn(controller);

        handle.start("Write", None).await.unwrap();
        sleep(seconds(125)).await;
        assert_eq!(handle.snapshot().timer.clock, "02:05");

        let request = handle.stop().await.unwrap().unwrap();
        assert_eq!(request.duration().num_seconds(), 125);
        assert_eq!(request.title, "Write");

        let settled = handle.settled().await.unwrap();
        assert_eq!(settled.last_synced_event.as_deref(), Some("evt-new"));
        assert_eq!(settled.calendar_sync_message, None);
        assert_eq!(settled.timer.state, TimerState::Idle);
        assert_eq!(sync.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rest_time_is_not_synced() {
        let sync = Arc::new(RecordingSync::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = TimerSettings::default()
            .with_pomodoro_minutes(1)
            .with_short_break_minutes(1);
        let handle =
            spawn(FocusController::new(settings, notifier.clone()).with_sync(sync.clone()));

        handle.start("Write", None).await.unwrap();
        sleep(seconds(90)).await;
        assert_eq!(handle.snapshot().timer.phase, TimerPhase::Rest);

        let request = handle.stop().await.unwrap().unwrap();
        assert_eq!(request.duration().num_seconds(), 60);

        handle.settled().await.unwrap();
        assert_eq!(sync.requests.lock().unwrap().clone(), vec![request]);
        assert_eq!(
            notifier.notices.lock().unwrap().clone(),
            vec![Notice::work_ended("Write")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn break_end_notifies_when_enabled() {
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = TimerSettings::default()
            .with_pomodoro_minutes(1)
            .with_short_break_minutes(1)
            .with_break_end_notifications(true);
        let handle = spawn(FocusController::new(settings, notifier.clone()));

        handle.start("Write", None).await.unwrap();
        sleep(seconds(120)).await;

        assert_eq!(
            notifier.notices.lock().unwrap().clone(),
            vec![Notice::work_ended("Write"), Notice::break_ended()]
        );
        assert_eq!(handle.snapshot().timer.phase, TimerPhase::Work);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_notifications_stay_quiet() {
        let notifier = Arc::new(RecordingNotifier::default());
        let settings = TimerSettings::default()
            .with_pomodoro_minutes(1)
            .with_notifications(false);
        let handle = spawn(FocusController::new(settings, notifier.clone()));

        handle.start("Write", None).await.unwrap();
        sleep(seconds(61)).await;
        assert!(notifier.notices.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_the_clock() {
        let handle = spawn(
            FocusController::new(TimerSettings::default(), Arc::new(NoopNotifier))
                .with_mode(TimerMode::Plain),
        );

        handle.start("Write", None).await.unwrap();
        sleep(seconds(10)).await;
        assert!(handle.pause().await.unwrap());
        sleep(seconds(100)).await;
        assert_eq!(handle.snapshot().timer.elapsed_seconds, 10);
        assert_eq!(handle.snapshot().timer.status, "Paused");

        assert!(handle.resume().await.unwrap());
        sleep(seconds(5)).await;
        assert_eq!(handle.snapshot().timer.elapsed_seconds, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_pause_resume_keeps_one_tick_stream() {
        let handle = spawn(
            FocusController::new(TimerSettings::default(), Arc::new(NoopNotifier))
                .with_mode(TimerMode::Plain),
        );

        handle.start("Write", None).await.unwrap();
        for _ in 0..5 {
            assert!(handle.pause().await.unwrap());
            assert!(handle.resume().await.unwrap());
        }
        sleep(seconds(4)).await;
        assert_eq!(handle.snapshot().timer.elapsed_seconds, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_failure_is_reported_and_cleared_on_start() {
        let sync = Arc::new(RecordingSync {
            fail: true,
            ..Default::default()
        });
        let handle = spawn(
            FocusController::new(TimerSettings::default(), Arc::new(NoopNotifier))
                .with_sync(sync),
        );

        handle.start("Write", None).await.unwrap();
        sleep(seconds(3)).await;
        handle.stop().await.unwrap();

        let settled = handle.settled().await.unwrap();
        assert_eq!(
            settled.calendar_sync_message.as_deref(),
            Some("Calendar sync failed: Calendar API error (500): backend down")
        );
        // The session still finished locally.
        assert_eq!(settled.timer.state, TimerState::Idle);

        handle.start("Next", None).await.unwrap();
        assert_eq!(handle.snapshot().calendar_sync_message, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_while_previous_sync_in_flight() {
        let sync = Arc::new(RecordingSync {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let handle = spawn(
            FocusController::new(TimerSettings::default(), Arc::new(NoopNotifier))
                .with_sync(sync.clone())
                .with_mode(TimerMode::Plain),
        );

        handle.start("First", None).await.unwrap();
        sleep(seconds(2)).await;
        assert!(handle.stop().await.unwrap().is_some());
        assert_eq!(handle.snapshot().pending_syncs, 1);

        handle.start("Second", None).await.unwrap();
        sleep(seconds(3)).await;
        assert!(handle.pause().await.unwrap());
        assert!(handle.stop().await.unwrap().is_some());
        assert_eq!(handle.stop().await.unwrap(), None);

        handle.settled().await.unwrap();
        let titles: Vec<_> = sync
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.title.clone())
            .collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_session_does_not_sync() {
        let sync = Arc::new(RecordingSync::default());
        let handle = spawn(
            FocusController::new(TimerSettings::default(), Arc::new(NoopNotifier))
                .with_sync(sync.clone()),
        );

        handle.start("Write", None).await.unwrap();
        assert_eq!(handle.stop().await.unwrap(), None);
        assert!(sync.requests.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_mode_rules() {
        let handle = spawn(FocusController::new(
            TimerSettings::default(),
            Arc::new(NoopNotifier),
        ));

        assert!(!handle.pause().await.unwrap());
        assert!(handle.set_mode(TimerMode::Plain).await.unwrap());
        handle
            .start("Write", Some(EventBinding::new("evt-1", true)))
            .await
            .unwrap();
        assert_eq!(
            handle.start("Again", None).await,
            Err(TimerError::SessionActive)
        );
        assert!(!handle.set_mode(TimerMode::Pomodoro).await.unwrap());
        assert_eq!(
            handle.snapshot().timer.binding,
            Some(EventBinding::new("evt-1", true))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_handles() {
        let controller = FocusController::new(TimerSettings::default(), Arc::new(NoopNotifier));
        let handle = controller.handle();
        let task = tokio::spawn(controller.run());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.pause().await, Err(TimerError::ControllerClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn settings_update_changes_idle_display() {
        let handle = spawn(FocusController::new(
            TimerSettings::default(),
            Arc::new(NoopNotifier),
        ));
        handle
            .update_settings(TimerSettings::default().with_pomodoro_minutes(10))
            .await
            .unwrap();
        // Commands are handled in order, so the snapshot after the next reply
        // reflects the new settings.
        handle.pause().await.unwrap();
        assert_eq!(handle.snapshot().timer.display_seconds, 600);
    }
}
