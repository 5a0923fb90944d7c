//! Google sign-in and Google Calendar access.
//!
//! - [`AuthTokenManager`] runs the OAuth 2.0 PKCE sign-in through an
//!   [`AuthorizationPresenter`](crate::presenter::AuthorizationPresenter) and
//!   keeps the credential fresh
//! - [`TokenStore`] persists the credential in a
//!   [`SecretStore`](crate::store::SecretStore)
//! - [`GoogleCalendarClient`] implements
//!   [`CalendarGateway`](crate::gateway::CalendarGateway) over Calendar API v3
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use calodoro_providers::google::{AuthTokenManager, GoogleCalendarClient, GoogleConfig, TokenStore};
//! use calodoro_providers::{FileSecretStore, LoopbackPresenter};
//!
//! let store = TokenStore::new(Arc::new(FileSecretStore::new("/tmp/calodoro")));
//! let auth = Arc::new(AuthTokenManager::new(
//!     GoogleConfig::new("your-client-id.apps.googleusercontent.com"),
//!     store,
//!     Arc::new(LoopbackPresenter::new()),
//! )?);
//!
//! if !auth.is_signed_in() {
//!     auth.sign_in().await?;
//! }
//! let calendar = GoogleCalendarClient::new(auth)?;
//! ```

mod client;
mod config;
mod oauth;
mod tokens;

pub use client::{GoogleCalendarClient, UNTITLED_EVENT};
pub use config::GoogleConfig;
pub use oauth::{AuthStatus, AuthTokenManager, PkceFlow, parse_callback};
pub use tokens::{Credential, TOKEN_KEY, TokenStore};
