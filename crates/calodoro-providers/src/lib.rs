//! Calendar access for calodoro: sign-in, token lifecycle, calendar gateway
//! and session sync.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │ CalendarSyncCoordinator  │  create vs. update vs. convert
//! └────────────┬─────────────┘
//!              ▼
//! ┌──────────────────────────┐
//! │ CalendarGateway          │  GoogleCalendarClient
//! └────────────┬─────────────┘
//!              ▼ bearer token per request
//! ┌──────────────────────────┐     ┌────────────────────────┐
//! │ AuthTokenManager         │ ──▶ │ AuthorizationPresenter │
//! └────────────┬─────────────┘     └────────────────────────┘
//!              ▼
//! ┌──────────────────────────┐
//! │ TokenStore / SecretStore │
//! └──────────────────────────┘
//! ```

pub mod error;
pub mod gateway;
pub mod google;
pub mod presenter;
pub mod store;
pub mod sync;

pub use error::{
    AuthError, AuthResult, CalendarError, CalendarResult, ErrorKind, StoreError, StoreResult,
    SyncError,
};
pub use gateway::{BoxFuture, CalendarGateway, EventSummary};
pub use presenter::{AuthorizationPresenter, CALLBACK_TIMEOUT, CancelHandle, LoopbackPresenter};
#[cfg(feature = "keyring")]
pub use store::KeyringSecretStore;
pub use store::{FileSecretStore, MemorySecretStore, SecretStore};
pub use sync::{CalendarSyncCoordinator, SyncOutcome};
