//! Interactive focus session.

use std::io::Write;
use std::sync::Arc;

use calodoro_core::{EventBinding, TimerMode, format_clock, normalize_title};
use calodoro_providers::{CalendarGateway, CalendarSyncCoordinator, LoopbackPresenter};
use calodoro_timer::{DesktopNotifier, FocusController, FocusSnapshot, NoopNotifier, Notifier};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::commands::events::find_event;
use crate::config::ClientConfig;
use crate::context::{Services, today_window};
use crate::error::ClientResult;

/// Flags of the `focus` command.
#[derive(Debug, Clone, Default)]
pub struct FocusOptions {
    pub title: Option<String>,
    pub mode: Option<TimerMode>,
    pub event: Option<String>,
    pub placeholder: bool,
    pub no_sync: bool,
}

/// A line typed during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusInput {
    Pause,
    Resume,
    Stop,
}

impl FocusInput {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(Self::Pause),
            "r" | "resume" => Some(Self::Resume),
            "s" | "stop" | "q" | "quit" => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Runs one session until the user stops it, then waits for the calendar
/// write to finish.
pub async fn run(config: &ClientConfig, options: FocusOptions) -> ClientResult<()> {
    let settings = config.timer_settings();
    let mode = options.mode.unwrap_or(config.timer.mode);
    let notifier: Arc<dyn Notifier> = if settings.notifications_enabled {
        Arc::new(DesktopNotifier::new())
    } else {
        Arc::new(NoopNotifier)
    };
    let mut controller = FocusController::new(settings, notifier).with_mode(mode);

    let mut title = options.title.clone().unwrap_or_default();
    let mut binding = None;

    let syncing = !options.no_sync;
    if syncing {
        let services = Services::new(config, LoopbackPresenter::new())?;
        services.require_sign_in()?;

        if let Some(id) = options.event.as_deref() {
            let events = services
                .calendar
                .fetch_upcoming_events(today_window()?)
                .await?;
            let event = find_event(&events, id)?;
            title = event.title.clone();
            binding = Some(EventBinding::new(&event.id, event.is_all_day));
        } else if options.placeholder {
            title = normalize_title(&title);
            let id = services
                .calendar
                .create_all_day_event(&title, Local::now().date_naive())
                .await?;
            println!("Created placeholder event {}", id);
            binding = Some(EventBinding::new(id, true));
        }

        let gateway: Arc<dyn CalendarGateway> = services.calendar.clone();
        controller = controller.with_sync(Arc::new(CalendarSyncCoordinator::new(gateway)));
    }

    let handle = controller.handle();
    let task = tokio::spawn(controller.run());

    handle.start(title, binding).await?;
    let snapshot = handle.snapshot();
    println!(
        "{} started: {}  (p = pause, r = resume, s = stop)",
        snapshot.timer.mode, snapshot.timer.title
    );

    let mut updates = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => match FocusInput::parse(&line) {
                    Some(FocusInput::Pause) => {
                        handle.pause().await?;
                    }
                    Some(FocusInput::Resume) => {
                        handle.resume().await?;
                    }
                    Some(FocusInput::Stop) => break,
                    None => eprintln!("\nunknown input '{}' (p, r or s)", line.trim()),
                },
                None => {
                    debug!("stdin closed, stopping session");
                    break;
                }
            },
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&updates.borrow_and_update());
            }
            _ = &mut ctrl_c => break,
        }
    }

    let request = handle.stop().await?;
    println!();
    match request {
        Some(ref request) => println!(
            "Worked {} on \"{}\".",
            format_clock(request.duration().num_seconds().max(0) as u64),
            request.title
        ),
        None => println!("No work time recorded."),
    }

    if syncing && request.is_some() {
        let snapshot = handle.settled().await?;
        match snapshot.calendar_sync_message {
            Some(message) => eprintln!("{}", message),
            None => println!(
                "Saved to calendar ({}).",
                snapshot.last_synced_event.as_deref().unwrap_or("no event")
            ),
        }
    }

    handle.shutdown().await?;
    let _ = task.await;
    Ok(())
}

fn render(snapshot: &FocusSnapshot) {
    print!("\r{:<32}", status_line(snapshot));
    let _ = std::io::stdout().flush();
}

fn status_line(snapshot: &FocusSnapshot) -> String {
    format!("{}  {}", snapshot.timer.label(), snapshot.timer.status)
}
