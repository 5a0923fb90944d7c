//! Google Calendar API client.
//!
//! Maps [`CalendarGateway`] operations onto Calendar API v3 requests. A bearer
//! token is fetched from the [`AuthTokenManager`] right before every request.

use std::fmt;
use std::sync::Arc;

use calodoro_core::TimeWindow;
use chrono::{DateTime, Local, NaiveDate, SecondsFormat, TimeZone, Utc};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::error::{CalendarError, CalendarResult};
use crate::gateway::{BoxFuture, CalendarGateway, EventSummary};

use super::config::GoogleConfig;
use super::oauth::AuthTokenManager;

/// Title given to listed events without a summary.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Google Calendar API client.
///
/// Timed event bodies are written with the UTC offset of `Tz` (the local
/// time zone by default).
pub struct GoogleCalendarClient<Tz: TimeZone = Local> {
    config: GoogleConfig,
    http: reqwest::Client,
    auth: Arc<AuthTokenManager>,
    tz: Tz,
}

impl GoogleCalendarClient<Local> {
    /// Creates a client that writes times in the local time zone.
    pub fn new(auth: Arc<AuthTokenManager>) -> CalendarResult<Self> {
        Self::with_timezone(auth, Local)
    }
}

impl<Tz> GoogleCalendarClient<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: fmt::Display + Send + Sync,
{
    /// Creates a client that writes times in `tz`.
    pub fn with_timezone(auth: Arc<AuthTokenManager>, tz: Tz) -> CalendarResult<Self> {
        let config = auth.config().clone();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CalendarError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http,
            auth,
            tz,
        })
    }

    /// Sends a request with a fresh bearer token and returns the body of a
    /// 200 response.
    async fn execute(&self, request: reqwest::RequestBuilder) -> CalendarResult<String> {
        let token = self.auth.valid_access_token().await?;
        let response = request.bearer_auth(token).send().await.map_err(|e| {
            if e.is_timeout() {
                CalendarError::Network("request timeout".to_string())
            } else if e.is_connect() {
                CalendarError::Network(format!("connection failed: {}", e))
            } else {
                CalendarError::Network(format!("request failed: {}", e))
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CalendarError::Network(format!("failed to read response: {}", e)))?;

        if status != StatusCode::OK {
            let message =
                decode_google_error(&body).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(status = status.as_u16(), %message, "calendar API error");
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body)
    }

    async fn list(&self, window: TimeWindow) -> CalendarResult<Vec<EventSummary>> {
        let request = self.http.get(self.config.events_url()).query(&[
            ("maxResults", self.config.max_results.to_string()),
            ("orderBy", "startTime".to_string()),
            ("singleEvents", "true".to_string()),
            ("timeMin", query_instant(window.start)),
            ("timeMax", query_instant(window.end)),
        ]);

        let body = self.execute(request).await?;
        let response: EventsResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "failed to parse event list");
            CalendarError::InvalidResponse
        })?;

        let events: Vec<EventSummary> = response
            .items
            .into_iter()
            .filter_map(convert_event)
            .collect();
        debug!(count = events.len(), "fetched events");
        Ok(events)
    }

    async fn insert(&self, payload: Value) -> CalendarResult<String> {
        let request = self
            .http
            .post(self.config.events_url())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string());

        let body = self.execute(request).await?;
        let response: EventWriteResponse = serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "failed to parse create response");
            CalendarError::InvalidResponse
        })?;
        let id = response.id.ok_or(CalendarError::MissingEventId)?;
        debug!(event_id = %id, "created event");
        Ok(id)
    }

    async fn patch(&self, event_id: &str, payload: Value) -> CalendarResult<()> {
        let request = self
            .http
            .patch(self.config.event_url(event_id))
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string());

        self.execute(request).await?;
        debug!(event_id, "patched event");
        Ok(())
    }
}

impl<Tz> CalendarGateway for GoogleCalendarClient<Tz>
where
    Tz: TimeZone + Send + Sync,
    Tz::Offset: fmt::Display + Send + Sync,
{
    fn fetch_upcoming_events(
        &self,
        window: TimeWindow,
    ) -> BoxFuture<'_, CalendarResult<Vec<EventSummary>>> {
        Box::pin(self.list(window))
    }

    fn create_event<'a>(
        &'a self,
        title: &'a str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxFuture<'a, CalendarResult<String>> {
        let payload = timed_event_body(title, start, end, &self.tz);
        Box::pin(self.insert(payload))
    }

    fn create_all_day_event<'a>(
        &'a self,
        title: &'a str,
        date: NaiveDate,
    ) -> BoxFuture<'a, CalendarResult<String>> {
        let payload = all_day_event_body(title, date);
        Box::pin(self.insert(payload))
    }

    fn update_event<'a>(
        &'a self,
        event_id: &'a str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        force_timed: bool,
    ) -> BoxFuture<'a, CalendarResult<()>> {
        let payload = timing_patch_body(start, end, force_timed, &self.tz);
        Box::pin(self.patch(event_id, payload))
    }

    fn update_event_metadata<'a>(
        &'a self,
        event_id: &'a str,
        summary: Option<&'a str>,
        description: Option<&'a str>,
    ) -> BoxFuture<'a, CalendarResult<()>> {
        let payload = metadata_body(summary, description);
        Box::pin(self.patch(event_id, payload))
    }
}

/// Event list response.
#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

/// Event resource as listed by the API.
#[derive(Debug, Deserialize)]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
}

/// Event time: either `dateTime` (timed) or `date` (all-day).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventWriteResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    message: Option<String>,
    #[serde(default)]
    errors: Vec<GoogleErrorItem>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorItem {
    reason: Option<String>,
}

/// Extracts `message (reason)` from an API error body.
fn decode_google_error(body: &str) -> Option<String> {
    let response: GoogleErrorResponse = serde_json::from_str(body).ok()?;
    let message = response.error.message?;
    match response.error.errors.first() {
        Some(item) => Some(format!(
            "{} ({})",
            message,
            item.reason.as_deref().unwrap_or("unknown")
        )),
        None => Some(message),
    }
}

fn convert_event(event: ApiEvent) -> Option<EventSummary> {
    let id = event.id?;
    let (start, start_all_day) = parse_event_time(event.start.as_ref()?)?;
    let (end, end_all_day) = parse_event_time(event.end.as_ref()?)?;
    Some(EventSummary {
        id,
        title: event.summary.unwrap_or_else(|| UNTITLED_EVENT.to_string()),
        start,
        end,
        is_all_day: start_all_day || end_all_day,
    })
}

/// Parses an event time into an instant and an all-day flag.
///
/// Dates without a time map to midnight UTC of that date.
fn parse_event_time(time: &ApiEventTime) -> Option<(DateTime<Utc>, bool)> {
    if let Some(date_time) = &time.date_time {
        return DateTime::parse_from_rfc3339(date_time)
            .map(|dt| (dt.with_timezone(&Utc), false))
            .map_err(|e| debug!(error = %e, "unparseable dateTime"))
            .ok();
    }
    let date = NaiveDate::parse_from_str(time.date.as_deref()?, "%Y-%m-%d")
        .map_err(|e| debug!(error = %e, "unparseable date"))
        .ok()?;
    Some((date.and_hms_opt(0, 0, 0)?.and_utc(), true))
}

fn query_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn event_date_time<Tz>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    instant
        .with_timezone(tz)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn event_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn no_reminders() -> Value {
    json!({ "useDefault": false, "overrides": [] })
}

pub(crate) fn timed_event_body<Tz>(
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: &Tz,
) -> Value
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    json!({
        "summary": title,
        "start": { "dateTime": event_date_time(start, tz) },
        "end": { "dateTime": event_date_time(end, tz) },
        "reminders": no_reminders(),
    })
}

/// All-day body spanning `date` through the next calendar day.
pub(crate) fn all_day_event_body(title: &str, date: NaiveDate) -> Value {
    let end = date.succ_opt().unwrap_or(date);
    json!({
        "summary": title,
        "start": { "date": event_date(date) },
        "end": { "date": event_date(end) },
        "reminders": no_reminders(),
    })
}

/// Timing-only patch. `force_timed` clears `date` on both ends and keeps the
/// span positive.
pub(crate) fn timing_patch_body<Tz>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    force_timed: bool,
    tz: &Tz,
) -> Value
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    if !force_timed {
        return json!({
            "start": { "dateTime": event_date_time(start, tz) },
            "end": { "dateTime": event_date_time(end, tz) },
        });
    }

    let end = if end <= start {
        start + chrono::Duration::seconds(60)
    } else {
        end
    };
    json!({
        "start": { "dateTime": event_date_time(start, tz), "date": null },
        "end": { "dateTime": event_date_time(end, tz), "date": null },
    })
}

pub(crate) fn metadata_body(summary: Option<&str>, description: Option<&str>) -> Value {
    let mut body = serde_json::Map::new();
    if let Some(summary) = summary {
        body.insert("summary".to_string(), json!(summary));
    }
    if let Some(description) = description {
        body.insert("description".to_string(), json!(description));
    }
    Value::Object(body)
}
