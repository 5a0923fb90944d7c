//! Calendar listing and placeholder commands.

use calodoro_providers::{CalendarGateway, EventSummary, LoopbackPresenter};
use chrono::Local;

use crate::config::ClientConfig;
use crate::context::{Services, today_window};
use crate::error::{ClientError, ClientResult};

/// Lists today's events.
pub async fn list(config: &ClientConfig, json: bool) -> ClientResult<()> {
    let services = Services::new(config, LoopbackPresenter::new())?;
    services.require_sign_in()?;

    let events = services
        .calendar
        .fetch_upcoming_events(today_window()?)
        .await?;

    if json {
        let out = serde_json::to_string_pretty(&events)
            .map_err(|e| ClientError::Config(format!("failed to encode events: {}", e)))?;
        println!("{}", out);
    } else if events.is_empty() {
        println!("No events today.");
    } else {
        for event in &events {
            println!("{}", render_event(event));
        }
    }
    Ok(())
}

/// Creates an all-day event for today and prints its id.
pub async fn placeholder(config: &ClientConfig, title: &str) -> ClientResult<()> {
    let services = Services::new(config, LoopbackPresenter::new())?;
    services.require_sign_in()?;

    let id = services
        .calendar
        .create_all_day_event(title, Local::now().date_naive())
        .await?;
    println!("{}", id);
    Ok(())
}

/// Finds an event by id in a listing.
pub fn find_event<'a>(events: &'a [EventSummary], id: &str) -> ClientResult<&'a EventSummary> {
    events
        .iter()
        .find(|event| event.id == id)
        .ok_or_else(|| ClientError::UnknownEvent(id.to_string()))
}

fn render_event(event: &EventSummary) -> String {
    let when = if event.is_all_day {
        "all day    ".to_string()
    } else {
        format!(
            "{}-{}",
            event.start.with_timezone(&Local).format("%H:%M"),
            event.end.with_timezone(&Local).format("%H:%M")
        )
    };
    format!("{}  {}  [{}]", when, event.title, event.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event(id: &str, all_day: bool) -> EventSummary {
        EventSummary {
            id: id.to_string(),
            title: format!("Event {}", id),
            start: Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 5, 7, 0, 0, 0).unwrap(),
            is_all_day: all_day,
        }
    }

    #[test]
    fn find_event_by_id() {
        let events = vec![event("a", false), event("b", true)];
        let found = find_event(&events, "b").unwrap();
        assert!(found.is_all_day);
        assert!(matches!(
            find_event(&events, "zzz"),
            Err(ClientError::UnknownEvent(ref id)) if id == "zzz"
        ));
    }

    #[test]
    fn all_day_events_render_without_times() {
        let line = render_event(&event("b", true));
        assert!(line.starts_with("all day"));
        assert!(line.ends_with("Event b  [b]"));
    }
}
