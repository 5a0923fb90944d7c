//! Seam between the controller and calendar sync.

use calodoro_core::SyncRequest;
use calodoro_providers::{
    BoxFuture, CalendarGateway, CalendarSyncCoordinator, SyncError, SyncOutcome,
};

/// Mirrors a finalized session somewhere outside the timer.
pub trait SessionSync: Send + Sync {
    fn sync_session<'a>(
        &'a self,
        request: &'a SyncRequest,
    ) -> BoxFuture<'a, Result<SyncOutcome, SyncError>>;
}

impl<G: CalendarGateway + ?Sized> SessionSync for CalendarSyncCoordinator<G> {
    fn sync_session<'a>(
        &'a self,
        request: &'a SyncRequest,
    ) -> BoxFuture<'a, Result<SyncOutcome, SyncError>> {
        Box::pin(self.sync(request))
    }
}
