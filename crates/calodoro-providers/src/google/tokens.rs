//! OAuth credential model and its persistence.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::store::SecretStore;

/// Key under which the credential record is stored.
pub const TOKEN_KEY: &str = "google-oauth-token";

/// Seconds subtracted from the server-reported lifetime.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// A complete OAuth credential.
///
/// Either the whole record exists or none of it does; refreshes replace it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token for API requests.
    pub access_token: String,
    /// Token used to obtain new access tokens, if the server issued one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Instant after which the access token is treated as expired.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Builds a credential from a token endpoint response received at `now`.
    ///
    /// The expiry is the reported lifetime minus a 60 second margin, never
    /// earlier than `now`.
    pub fn from_response(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let lifetime = (expires_in_secs - EXPIRY_MARGIN_SECS).max(0);
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: now + Duration::seconds(lifetime),
        }
    }

    /// Returns true once `now` has reached the expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Returns true if the access token is expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Persists the single credential record in a [`SecretStore`].
#[derive(Debug, Clone)]
pub struct TokenStore {
    backend: Arc<dyn SecretStore>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn SecretStore>) -> Self {
        Self { backend }
    }

    /// Loads the stored credential, if any.
    pub fn load(&self) -> StoreResult<Option<Credential>> {
        let Some(bytes) = self.backend.get(TOKEN_KEY)? else {
            debug!("no stored credential");
            return Ok(None);
        };
        let credential = serde_json::from_slice(&bytes)?;
        debug!("loaded stored credential");
        Ok(Some(credential))
    }

    /// Replaces the stored credential.
    pub fn save(&self, credential: &Credential) -> StoreResult<()> {
        let bytes = serde_json::to_vec(credential)?;
        self.backend.put(TOKEN_KEY, &bytes)?;
        debug!(expires_at = %credential.expires_at, "saved credential");
        Ok(())
    }

    /// Removes the stored credential.
    pub fn clear(&self) -> StoreResult<()> {
        self.backend.delete(TOKEN_KEY)?;
        info!("cleared stored credential");
        Ok(())
    }
}
