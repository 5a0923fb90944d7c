//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calodoro/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`) support secret references
//! (`pass::…`, `env::…`, `keyring::…`, see [`crate::secret`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use calodoro_core::TimerMode;
use calodoro_providers::google::GoogleConfig;
use calodoro_timer::{DEFAULT_POMODORO_MINUTES, DEFAULT_SHORT_BREAK_MINUTES, TimerSettings};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Configuration for the calodoro client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub google: GoogleSettings,
    pub timer: TimerSection,
    pub notifications: NotificationSection,
    pub storage: StorageSection,
}

/// `[google]`: OAuth client and calendar selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports secret references).
    pub client_id: Option<String>,

    /// OAuth client secret (supports secret references).
    pub client_secret: Option<String>,

    /// Loopback redirect registered for the client.
    pub redirect_uri: Option<String>,

    /// Calendar to list and write; `primary` when unset.
    pub calendar_id: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// `[timer]`: work and break lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerSection {
    /// Work phase length; 0 means the default.
    pub pomodoro_minutes: u32,
    /// Break length; 0 means the default.
    pub short_break_minutes: u32,
    /// Mode used when `focus` is run without `--mode`.
    pub mode: TimerMode,
}

impl Default for TimerSection {
    fn default() -> Self {
        Self {
            pomodoro_minutes: DEFAULT_POMODORO_MINUTES,
            short_break_minutes: DEFAULT_SHORT_BREAK_MINUTES,
            mode: TimerMode::Pomodoro,
        }
    }
}

/// `[notifications]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSection {
    pub enabled: bool,
    pub work_end: bool,
    pub break_end: bool,
}

impl Default for NotificationSection {
    fn default() -> Self {
        Self {
            enabled: true,
            work_end: true,
            break_end: false,
        }
    }
}

/// Where the OAuth credential is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

/// `[storage]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub backend: StorageBackend,
    /// Directory for the file backend; `<data_dir>/calodoro` when unset.
    pub dir: Option<PathBuf>,
}

impl ClientConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    debug!(path = %path.display(), "no config file, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content)
            .map_err(|e| ClientError::Config(format!("failed to parse config: {}", e)))
    }

    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calodoro")
    }

    /// Timer settings, with zero lengths replaced by the defaults.
    pub fn timer_settings(&self) -> TimerSettings {
        let or_default = |value: u32, default: u32| if value == 0 { default } else { value };
        TimerSettings::default()
            .with_pomodoro_minutes(or_default(
                self.timer.pomodoro_minutes,
                DEFAULT_POMODORO_MINUTES,
            ))
            .with_short_break_minutes(or_default(
                self.timer.short_break_minutes,
                DEFAULT_SHORT_BREAK_MINUTES,
            ))
            .with_notifications(self.notifications.enabled)
            .with_work_end_notifications(self.notifications.work_end)
            .with_break_end_notifications(self.notifications.break_end)
    }
}

impl GoogleSettings {
    /// Resolves secret references and builds the provider configuration.
    pub fn to_provider_config(&self) -> ClientResult<GoogleConfig> {
        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            ClientError::Config(format!(
                "Google client id not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"",
                ClientConfig::default_path().display()
            ))
        })?;
        let client_id = crate::secret::resolve(raw_id)
            .map_err(|e| ClientError::Config(format!("failed to resolve client_id: {}", e)))?;

        let mut config = GoogleConfig::new(client_id);

        if let Some(raw_secret) = self.client_secret.as_deref() {
            let secret = crate::secret::resolve(raw_secret).map_err(|e| {
                ClientError::Config(format!("failed to resolve client_secret: {}", e))
            })?;
            config = config.with_client_secret(secret);
        }
        if let Some(ref uri) = self.redirect_uri {
            config = config.with_redirect_uri(uri);
        }
        if let Some(ref id) = self.calendar_id {
            config = config.with_calendar_id(id);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }
}
