//! OAuth 2.0 PKCE sign-in and token lifecycle for Google APIs.
//!
//! # Flow Overview
//!
//! 1. Generate a code verifier and its SHA-256 challenge
//! 2. Build the authorization URL and hand it to an [`AuthorizationPresenter`]
//! 3. Parse the redirect for `code`, `error` and `state`
//! 4. Exchange the code (with verifier) for access and refresh tokens
//! 5. Persist the credential; refresh it transparently when it expires
//!
//! Refreshes are single-flight: concurrent callers of
//! [`AuthTokenManager::valid_access_token`] queue behind one refresh and all
//! observe its result. Sign-in and sign-out bump a generation counter, and
//! a refresh whose credential was replaced or removed meanwhile is dropped
//! instead of being written back.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use rand::Rng as _;
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AuthError, AuthResult, StoreError};
use crate::presenter::AuthorizationPresenter;

use super::config::GoogleConfig;
use super::tokens::{Credential, TokenStore};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Sign-in state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    SignedOut,
    SigningIn,
    SignedIn,
}

impl AuthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignedOut => "signed out",
            Self::SigningIn => "signing in",
            Self::SignedIn => "signed in",
        }
    }
}

/// PKCE verifier/challenge pair for one sign-in attempt.
///
/// Implements RFC 7636. Never persisted.
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// SHA-256 of the verifier, base64url without padding.
    pub challenge: String,
    /// Random state echoed back by the redirect.
    pub state: String,
}

impl PkceFlow {
    pub fn new() -> Self {
        let verifier = random_token(CODE_VERIFIER_LENGTH);
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: random_token(16),
        }
    }

    fn compute_challenge(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }

    /// Builds the authorization URL for `config`.
    pub fn authorization_url(&self, config: &GoogleConfig) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent&include_granted_scopes=true",
            config.auth_url,
            urlencoding::encode(&config.client_id),
            urlencoding::encode(&config.redirect_uri),
            urlencoding::encode(&config.scopes.join(" ")),
            urlencoding::encode(&self.challenge),
            urlencoding::encode(&self.state),
        )
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceFlow")
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Extracts the authorization code from a redirect URL.
///
/// An `error` parameter wins over everything else. When `expected_state` is
/// given and the callback carries a different state, the callback is
/// rejected.
pub fn parse_callback(callback: &str, expected_state: Option<&str>) -> AuthResult<String> {
    let url = Url::parse(callback).map_err(|_| AuthError::InvalidCallback)?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::OAuthError(error));
    }
    if let (Some(expected), Some(received)) = (expected_state, state.as_deref())
        && expected != received
    {
        warn!("OAuth state mismatch");
        return Err(AuthError::InvalidCallback);
    }
    code.filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingAuthCode)
}

/// Success body from the token endpoint.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Error body from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenErrorResponse {
    fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    fn reason(&self) -> String {
        match &self.error_description {
            Some(description) => format!("{}: {}", self.error, description),
            None => self.error.clone(),
        }
    }
}

/// The in-memory credential and the number of times it was replaced or
/// removed by sign-in or sign-out.
struct CredentialSlot {
    credential: Option<Credential>,
    generation: u64,
}

/// Owns the credential: sign-in, sign-out, and refresh.
pub struct AuthTokenManager {
    config: GoogleConfig,
    http: reqwest::Client,
    store: TokenStore,
    presenter: Arc<dyn AuthorizationPresenter>,
    slot: RwLock<CredentialSlot>,
    refresh_lock: Mutex<()>,
    status: watch::Sender<AuthStatus>,
}

impl AuthTokenManager {
    /// Creates a manager and loads any persisted credential.
    ///
    /// An unreadable credential record is discarded with a warning.
    pub fn new(
        config: GoogleConfig,
        store: TokenStore,
        presenter: Arc<dyn AuthorizationPresenter>,
    ) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Network(format!("failed to create HTTP client: {}", e)))?;

        let credential = match store.load() {
            Ok(credential) => credential,
            Err(StoreError::Encoding(e)) => {
                warn!(error = %e, "discarding unreadable credential");
                store.clear()?;
                None
            }
            Err(e) => return Err(e.into()),
        };
        let status = if credential.is_some() {
            AuthStatus::SignedIn
        } else {
            AuthStatus::SignedOut
        };

        Ok(Self {
            config,
            http,
            store,
            presenter,
            slot: RwLock::new(CredentialSlot {
                credential,
                generation: 0,
            }),
            refresh_lock: Mutex::new(()),
            status: watch::channel(status).0,
        })
    }

    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Current sign-in state.
    pub fn status(&self) -> AuthStatus {
        *self.status.borrow()
    }

    /// Subscribes to sign-in state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    /// Runs the interactive PKCE sign-in.
    ///
    /// On failure the previous credential and status are left untouched.
    pub async fn sign_in(&self) -> AuthResult<()> {
        self.config.validate()?;

        let pkce = PkceFlow::new();
        let auth_url = pkce.authorization_url(&self.config);
        debug!(auth_url = %auth_url, "starting sign-in");

        let previous = self.status.send_replace(AuthStatus::SigningIn);
        match self.complete_sign_in(&pkce, &auth_url).await {
            Ok(()) => {
                self.status.send_replace(AuthStatus::SignedIn);
                info!("signed in");
                Ok(())
            }
            Err(e) => {
                self.status.send_replace(previous);
                warn!(error = %e, kind = %e.kind(), "sign-in failed");
                Err(e)
            }
        }
    }

    async fn complete_sign_in(&self, pkce: &PkceFlow, auth_url: &str) -> AuthResult<()> {
        let callback = self
            .presenter
            .present(auth_url, &self.config.redirect_uri)
            .await?;
        let code = parse_callback(&callback, Some(&pkce.state))?;

        info!("received authorization code, exchanging for tokens");
        let credential = self.exchange_code(&code, &pkce.verifier).await?;

        let mut slot = self.slot_mut();
        self.store.save(&credential)?;
        slot.credential = Some(credential);
        slot.generation += 1;
        Ok(())
    }

    /// Forgets the credential. Never fails; storage errors are logged.
    pub fn sign_out(&self) {
        self.clear_credential(None);
    }

    /// Drops the credential, unless `expected` is given and a sign-in or
    /// sign-out has happened since that generation was read.
    fn clear_credential(&self, expected: Option<u64>) {
        {
            let mut slot = self.slot_mut();
            if expected.is_some_and(|generation| generation != slot.generation) {
                return;
            }
            slot.credential = None;
            slot.generation += 1;
            if let Err(e) = self.store.clear() {
                warn!(error = %e, "failed to clear stored credential");
            }
        }
        self.status.send_replace(AuthStatus::SignedOut);
        info!("signed out");
    }

    /// Returns an unexpired access token, refreshing it if needed.
    pub async fn valid_access_token(&self) -> AuthResult<String> {
        if let Some(token) = self.unexpired_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while this one waited.
        let (credential, generation) = {
            let slot = self.slot();
            (slot.credential.clone(), slot.generation)
        };
        let Some(credential) = credential else {
            return Err(AuthError::NotAuthenticated);
        };
        if !credential.is_expired() {
            return Ok(credential.access_token);
        }
        let Some(refresh_token) = credential.refresh_token.filter(|t| !t.is_empty()) else {
            warn!("access token expired and no refresh token is available");
            self.clear_credential(Some(generation));
            return Err(AuthError::NotAuthenticated);
        };

        let refreshed = self.refresh(&refresh_token, generation).await?;

        let mut slot = self.slot_mut();
        if slot.generation != generation {
            debug!("credential changed during refresh, discarding refreshed token");
            return slot
                .credential
                .as_ref()
                .filter(|c| !c.is_expired())
                .map(|c| c.access_token.clone())
                .ok_or(AuthError::NotAuthenticated);
        }
        let token = refreshed.access_token.clone();
        if let Err(e) = self.store.save(&refreshed) {
            warn!(error = %e, "failed to persist refreshed credential");
        }
        slot.credential = Some(refreshed);
        Ok(token)
    }

    fn slot(&self) -> RwLockReadGuard<'_, CredentialSlot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot_mut(&self) -> RwLockWriteGuard<'_, CredentialSlot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Option<Credential> {
        self.slot().credential.clone()
    }

    fn unexpired_token(&self) -> Option<String> {
        self.slot()
            .credential
            .as_ref()
            .filter(|c| !c.is_expired())
            .map(|c| c.access_token.clone())
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> AuthResult<Credential> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let (status, body) = self.post_token(&params).await?;
        if status != StatusCode::OK {
            let reason = TokenErrorResponse::parse(&body)
                .map(|e| e.reason())
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(AuthError::TokenExchangeFailed(reason));
        }

        let response = parse_token_response(&body)?;
        info!("obtained tokens");
        Ok(Credential::from_response(
            response.access_token,
            response.refresh_token,
            response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            Utc::now(),
        ))
    }

    /// Performs the refresh-token grant.
    ///
    /// An `invalid_grant` answer means the refresh token is dead, so the
    /// credential read at `generation` is dropped.
    async fn refresh(&self, refresh_token: &str, generation: u64) -> AuthResult<Credential> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        debug!("refreshing access token");
        let (status, body) = self.post_token(&params).await?;
        if status != StatusCode::OK {
            let error = TokenErrorResponse::parse(&body);
            warn!(
                status = status.as_u16(),
                reason = error.as_ref().map(|e| e.reason()).as_deref().unwrap_or("unknown"),
                "token refresh failed"
            );
            if error.is_some_and(|e| e.error == "invalid_grant") {
                self.clear_credential(Some(generation));
            }
            return Err(AuthError::TokenRefreshFailed);
        }

        let response = parse_token_response(&body)?;
        info!("refreshed access token");
        Ok(Credential::from_response(
            response.access_token,
            response
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            Utc::now(),
        ))
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> AuthResult<(StatusCode, String)> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Network(format!("failed to read token response: {}", e)))?;
        Ok((status, body))
    }
}

impl std::fmt::Debug for AuthTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTokenManager")
            .field("client_id", &self.config.client_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

fn parse_token_response(body: &str) -> AuthResult<TokenResponse> {
    serde_json::from_str(body).map_err(|e| AuthError::InvalidResponse(e.to_string()))
}
