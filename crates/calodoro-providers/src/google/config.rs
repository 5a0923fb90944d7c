//! Google OAuth and Calendar API configuration.

use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Configuration for signing in to Google and talking to the Calendar API.
///
/// The endpoint URLs are overridable so tests can point them at a local
/// mock server.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client ID from the Google Cloud Console.
    pub client_id: String,

    /// OAuth client secret. Desktop clients using PKCE may omit it.
    pub client_secret: Option<String>,

    /// Redirect target registered for the client.
    pub redirect_uri: String,

    /// Scopes requested at sign-in.
    pub scopes: Vec<String>,

    /// Calendar that events are listed from and written to.
    pub calendar_id: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Maximum number of events returned by a listing.
    pub max_results: u32,

    pub auth_url: String,
    pub token_url: String,
    pub api_base: String,
}

impl GoogleConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_MAX_RESULTS: u32 = 50;
    pub const DEFAULT_CALENDAR_ID: &'static str = "primary";
    pub const DEFAULT_REDIRECT_URI: &'static str = "http://127.0.0.1:8765/oauth2callback";

    pub const SCOPE_CALENDAR_READONLY: &'static str =
        "https://www.googleapis.com/auth/calendar.readonly";
    pub const SCOPE_CALENDAR_EVENTS: &'static str =
        "https://www.googleapis.com/auth/calendar.events";

    pub const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    pub const API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";

    /// Creates a configuration for the given client ID with default settings.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: Self::DEFAULT_REDIRECT_URI.to_string(),
            scopes: vec![
                Self::SCOPE_CALENDAR_READONLY.to_string(),
                Self::SCOPE_CALENDAR_EVENTS.to_string(),
            ],
            calendar_id: Self::DEFAULT_CALENDAR_ID.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            max_results: Self::DEFAULT_MAX_RESULTS,
            auth_url: Self::AUTH_URL.to_string(),
            token_url: Self::TOKEN_URL.to_string(),
            api_base: Self::API_BASE.to_string(),
        }
    }

    /// Sets the client secret. Empty strings are treated as absent.
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        self.client_secret = (!secret.is_empty()).then_some(secret);
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    /// Points the authorization, token and API endpoints at another host.
    pub fn with_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self.api_base = api_base.into();
        self
    }

    /// Checks that the client can start a sign-in.
    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.trim().is_empty() || self.redirect_uri.trim().is_empty() {
            return Err(AuthError::MissingConfiguration);
        }
        Ok(())
    }

    /// URL of the events collection of the configured calendar.
    pub(crate) fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// URL of one event of the configured calendar.
    pub(crate) fn event_url(&self, event_id: &str) -> String {
        format!("{}/{}", self.events_url(), urlencoding::encode(event_id))
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self::new("")
    }
}
