//! Secret references in `config.toml`.
//!
//! `client_id` and `client_secret` may point outside the file:
//!
//! - `pass::path/in/store`: first line of `pass show path/in/store`
//! - `env::VAR_NAME`: the `$VAR_NAME` environment variable
//! - `keyring::account`: `account` in the OS keyring (service `calodoro`)
//!
//! Any other value is taken literally.

use std::process::Command;

use thiserror::Error;

/// Failure to turn a reference into its value.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to run `pass show {path}`: {source}")]
    PassSpawn {
        path: String,
        source: std::io::Error,
    },

    #[error("`pass show {path}` failed ({status}): {stderr}")]
    PassFailed {
        path: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`pass show {0}` produced no output")]
    PassEmpty(String),

    #[error("environment variable `{0}` is not set")]
    EnvMissing(String),

    #[error("keyring lookup for `{account}` failed: {reason}")]
    Keyring { account: String, reason: String },
}

/// Where a configured value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    Literal(&'a str),
    Pass(&'a str),
    Env(&'a str),
    Keyring(&'a str),
}

impl<'a> SecretRef<'a> {
    pub fn parse(value: &'a str) -> Self {
        let prefixed: [(&str, fn(&'a str) -> Self); 3] = [
            ("pass::", Self::Pass),
            ("env::", Self::Env),
            ("keyring::", Self::Keyring),
        ];
        prefixed
            .into_iter()
            .find_map(|(prefix, make)| value.strip_prefix(prefix).map(make))
            .unwrap_or(Self::Literal(value))
    }

    pub fn resolve(self) -> Result<String, SecretError> {
        match self {
            Self::Literal(value) => Ok(value.to_string()),
            Self::Pass(path) => from_pass(path),
            Self::Env(var) => {
                std::env::var(var).map_err(|_| SecretError::EnvMissing(var.to_string()))
            }
            Self::Keyring(account) => from_keyring(account),
        }
    }
}

/// Resolves `value`, following a reference prefix if it has one.
pub fn resolve(value: &str) -> Result<String, SecretError> {
    SecretRef::parse(value).resolve()
}

fn from_pass(path: &str) -> Result<String, SecretError> {
    let output = Command::new("pass")
        .args(["show", path])
        .output()
        .map_err(|source| SecretError::PassSpawn {
            path: path.to_string(),
            source,
        })?;
    if !output.status.success() {
        return Err(SecretError::PassFailed {
            path: path.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
        .ok_or_else(|| SecretError::PassEmpty(path.to_string()))
}

#[cfg(feature = "keyring")]
fn from_keyring(account: &str) -> Result<String, SecretError> {
    use calodoro_providers::{KeyringSecretStore, SecretStore};

    let failed = |reason: String| SecretError::Keyring {
        account: account.to_string(),
        reason,
    };
    let bytes = KeyringSecretStore::default()
        .get(account)
        .map_err(|e| failed(e.to_string()))?
        .ok_or_else(|| failed("no such entry".to_string()))?;
    String::from_utf8(bytes).map_err(|_| failed("entry is not UTF-8".to_string()))
}

#[cfg(not(feature = "keyring"))]
fn from_keyring(account: &str) -> Result<String, SecretError> {
    Err(SecretError::Keyring {
        account: account.to_string(),
        reason: "built without keyring support".to_string(),
    })
}
