//! Mirrors finalized focus sessions onto the calendar.

use std::sync::Arc;

use calodoro_core::SyncRequest;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::gateway::CalendarGateway;

/// What a sync did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The interval was empty; nothing was sent.
    Skipped,
    /// A new timed event was created.
    Created { event_id: String },
    /// The bound timed event was re-timed.
    Updated { event_id: String },
    /// The bound all-day placeholder became a timed event.
    Converted { event_id: String },
}

impl SyncOutcome {
    /// Event touched by the sync, if any.
    pub fn event_id(&self) -> Option<&str> {
        match self {
            Self::Skipped => None,
            Self::Created { event_id }
            | Self::Updated { event_id }
            | Self::Converted { event_id } => Some(event_id),
        }
    }
}

/// Decides between creating, re-timing and converting events.
///
/// Never retries; a failed mutation is returned as a [`SyncError`].
pub struct CalendarSyncCoordinator<G: ?Sized = dyn CalendarGateway> {
    gateway: Arc<G>,
}

impl<G: CalendarGateway + ?Sized> CalendarSyncCoordinator<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Applies one finalized session to the calendar.
    ///
    /// A created event's id is reported in the outcome only; the caller's
    /// session is not rebound.
    pub async fn sync(&self, request: &SyncRequest) -> Result<SyncOutcome, SyncError> {
        if request.is_empty() {
            debug!("empty work interval, skipping sync");
            return Ok(SyncOutcome::Skipped);
        }

        let result = match request.event_id.as_deref() {
            None => self
                .gateway
                .create_event(&request.title, request.start, request.end)
                .await
                .map(|event_id| SyncOutcome::Created { event_id }),
            Some(event_id) if request.was_all_day => self
                .gateway
                .update_event(event_id, request.start, request.end, true)
                .await
                .map(|()| SyncOutcome::Converted {
                    event_id: event_id.to_string(),
                }),
            Some(event_id) => self
                .gateway
                .update_event(event_id, request.start, request.end, false)
                .await
                .map(|()| SyncOutcome::Updated {
                    event_id: event_id.to_string(),
                }),
        };

        match result {
            Ok(outcome) => {
                info!(
                    event_id = outcome.event_id().unwrap_or_default(),
                    seconds = request.duration().num_seconds(),
                    "session synced to calendar"
                );
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, kind = %e.kind(), "calendar sync failed");
                Err(SyncError::from(e))
            }
        }
    }
}

impl<G: ?Sized> Clone for CalendarSyncCoordinator<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CalendarError, CalendarResult, ErrorKind};
    use crate::gateway::{BoxFuture, EventSummary};
    use calodoro_core::{EventBinding, TimeWindow};
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Create(String, DateTime<Utc>, DateTime<Utc>),
        Update(String, DateTime<Utc>, DateTime<Utc>, bool),
    }

    /// Records mutations and answers with canned results.
    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<Call>>,
        fail_with: Option<u16>,
    }

    impl RecordingGateway {
        fn result<T>(&self, value: T) -> CalendarResult<T> {
            match self.fail_with {
                Some(status) => Err(CalendarError::Api {
                    status,
                    message: format!("HTTP {}", status),
                }),
                None => Ok(value),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CalendarGateway for RecordingGateway {
        fn fetch_upcoming_events(
            &self,
            _: TimeWindow,
        ) -> BoxFuture<'_, CalendarResult<Vec<EventSummary>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn create_event<'a>(
            &'a self,
            title: &'a str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> BoxFuture<'a, CalendarResult<String>> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Create(title.to_string(), start, end));
            Box::pin(async move { self.result("new-evt".to_string()) })
        }

        fn create_all_day_event<'a>(
            &'a self,
            _: &'a str,
            _: NaiveDate,
        ) -> BoxFuture<'a, CalendarResult<String>> {
            Box::pin(async move { self.result("placeholder".to_string()) })
        }

        fn update_event<'a>(
            &'a self,
            event_id: &'a str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            force_timed: bool,
        ) -> BoxFuture<'a, CalendarResult<()>> {
            self.calls.lock().unwrap().push(Call::Update(
                event_id.to_string(),
                start,
                end,
                force_timed,
            ));
            Box::pin(async move { self.result(()) })
        }

        fn update_event_metadata<'a>(
            &'a self,
            _: &'a str,
            _: Option<&'a str>,
            _: Option<&'a str>,
        ) -> BoxFuture<'a, CalendarResult<()>> {
            Box::pin(async move { self.result(()) })
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, h, m, s).unwrap()
    }

    fn coordinator(gateway: &Arc<RecordingGateway>) -> CalendarSyncCoordinator<RecordingGateway> {
        CalendarSyncCoordinator::new(Arc::clone(gateway))
    }

    #[tokio::test]
    async fn empty_interval_is_skipped() {
        let gateway = Arc::new(RecordingGateway::default());
        let request = SyncRequest::new("Focus", at(9, 0, 0), at(9, 0, 0));

        let outcome = coordinator(&gateway).sync(&request).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn unbound_session_creates_event() {
        let gateway = Arc::new(RecordingGateway::default());
        let request = SyncRequest::new("Focus", at(9, 0, 0), at(9, 2, 5));

        let outcome = coordinator(&gateway).sync(&request).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Created {
                event_id: "new-evt".into()
            }
        );
        assert_eq!(
            gateway.calls(),
            vec![Call::Create("Focus".into(), at(9, 0, 0), at(9, 2, 5))]
        );
    }

    #[tokio::test]
    async fn bound_timed_event_is_retimed() {
        let gateway = Arc::new(RecordingGateway::default());
        let binding = EventBinding::new("evt-7", false);
        let request =
            SyncRequest::new("Focus", at(9, 0, 0), at(9, 25, 0)).with_binding(Some(&binding));

        let outcome = coordinator(&gateway).sync(&request).await.unwrap();
        assert_eq!(outcome.event_id(), Some("evt-7"));
        assert!(matches!(outcome, SyncOutcome::Updated { .. }));
        assert_eq!(
            gateway.calls(),
            vec![Call::Update("evt-7".into(), at(9, 0, 0), at(9, 25, 0), false)]
        );
    }

    #[tokio::test]
    async fn bound_placeholder_is_converted() {
        let gateway = Arc::new(RecordingGateway::default());
        let binding = EventBinding::new("evt-all-day", true);
        let request =
            SyncRequest::new("Focus", at(9, 0, 0), at(9, 50, 0)).with_binding(Some(&binding));

        let outcome = coordinator(&gateway).sync(&request).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Converted { .. }));
        assert_eq!(
            gateway.calls(),
            vec![Call::Update(
                "evt-all-day".into(),
                at(9, 0, 0),
                at(9, 50, 0),
                true
            )]
        );
    }

    #[tokio::test]
    async fn gateway_failure_is_sync_error() {
        let gateway = Arc::new(RecordingGateway {
            fail_with: Some(403),
            ..Default::default()
        });
        let request = SyncRequest::new("Focus", at(9, 0, 0), at(9, 25, 0));

        let err = coordinator(&gateway).sync(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyncFailure);
        assert_eq!(err.cause().status(), Some(403));
        assert_eq!(
            err.to_string(),
            "Calendar sync failed: Calendar API error (403): HTTP 403"
        );
        // Exactly one attempt, no retry.
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn works_through_trait_object() {
        let gateway: Arc<dyn CalendarGateway> = Arc::new(RecordingGateway::default());
        let coordinator: CalendarSyncCoordinator = CalendarSyncCoordinator::new(gateway);
        let request = SyncRequest::new("Focus", at(9, 0, 0), at(9, 1, 0));
        assert!(coordinator.sync(&request).await.is_ok());
    }
}
