//! CalendarGateway trait definition.
//!
//! The gateway is a stateless mapping from calendar operations to remote API
//! requests. It never retries; every failure is returned to the caller.

use std::future::Future;
use std::pin::Pin;

use calodoro_core::TimeWindow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CalendarResult;

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An event as listed by the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    /// Provider-assigned identifier.
    pub id: String,
    /// Event title ("Untitled Event" when the provider had none).
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// True if either endpoint is a date without a time.
    pub is_all_day: bool,
}

/// Remote calendar operations needed by the focus timer.
pub trait CalendarGateway: Send + Sync {
    /// Lists events overlapping `window`, recurring events expanded, ordered by
    /// start time. Items with unparseable times are dropped.
    fn fetch_upcoming_events(
        &self,
        window: TimeWindow,
    ) -> BoxFuture<'_, CalendarResult<Vec<EventSummary>>>;

    /// Creates a timed event and returns its id.
    fn create_event<'a>(
        &'a self,
        title: &'a str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> BoxFuture<'a, CalendarResult<String>>;

    /// Creates an all-day event on `date` and returns its id.
    fn create_all_day_event<'a>(
        &'a self,
        title: &'a str,
        date: NaiveDate,
    ) -> BoxFuture<'a, CalendarResult<String>>;

    /// Patches the timing of an existing event.
    ///
    /// With `force_timed`, date-only fields are explicitly cleared and a
    /// non-positive span is widened to one minute.
    fn update_event<'a>(
        &'a self,
        event_id: &'a str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        force_timed: bool,
    ) -> BoxFuture<'a, CalendarResult<()>>;

    /// Patches only the provided descriptive fields of an event.
    fn update_event_metadata<'a>(
        &'a self,
        event_id: &'a str,
        summary: Option<&'a str>,
        description: Option<&'a str>,
    ) -> BoxFuture<'a, CalendarResult<()>>;
}
