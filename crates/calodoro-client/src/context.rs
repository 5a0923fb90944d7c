//! Wires configuration into the provider stack.

use std::sync::Arc;

use calodoro_core::TimeWindow;
use calodoro_providers::google::{AuthTokenManager, GoogleCalendarClient, TokenStore};
use calodoro_providers::{FileSecretStore, LoopbackPresenter, SecretStore};
use chrono::Local;
use tracing::debug;

use crate::config::{ClientConfig, StorageBackend};
use crate::error::{ClientError, ClientResult};

/// Signed-in services shared by the commands.
pub struct Services {
    pub auth: Arc<AuthTokenManager>,
    pub calendar: Arc<GoogleCalendarClient>,
}

impl Services {
    /// Builds the auth manager and calendar client from `config`.
    pub fn new(config: &ClientConfig, presenter: LoopbackPresenter) -> ClientResult<Self> {
        let google = config.google.to_provider_config()?;
        let store = TokenStore::new(secret_store(config)?);
        let auth = Arc::new(AuthTokenManager::new(google, store, Arc::new(presenter))?);
        let calendar = Arc::new(GoogleCalendarClient::new(Arc::clone(&auth))?);
        Ok(Self { auth, calendar })
    }

    /// Fails unless a credential is stored.
    pub fn require_sign_in(&self) -> ClientResult<()> {
        if self.auth.is_signed_in() {
            Ok(())
        } else {
            Err(ClientError::SignInRequired)
        }
    }
}

/// Opens the configured secret store.
pub fn secret_store(config: &ClientConfig) -> ClientResult<Arc<dyn SecretStore>> {
    match config.storage.backend {
        StorageBackend::File => {
            let dir = match config.storage.dir.clone() {
                Some(dir) => dir,
                None => FileSecretStore::default_dir().ok_or_else(|| {
                    ClientError::Config("cannot determine a data directory".to_string())
                })?,
            };
            debug!(dir = %dir.display(), "using file secret store");
            Ok(Arc::new(FileSecretStore::new(dir)))
        }
        #[cfg(feature = "keyring")]
        StorageBackend::Keyring => Ok(Arc::new(calodoro_providers::KeyringSecretStore::default())),
        #[cfg(not(feature = "keyring"))]
        StorageBackend::Keyring => Err(ClientError::Config(
            "keyring storage requested but calodoro was built without keyring support"
                .to_string(),
        )),
    }
}

/// The local calendar day containing now.
pub fn today_window() -> ClientResult<TimeWindow> {
    let today = Local::now().date_naive();
    TimeWindow::for_date(today, &Local)
        .ok_or_else(|| ClientError::Config(format!("cannot compute the time window for {}", today)))
}
