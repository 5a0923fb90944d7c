//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    if config.google.client_id.is_some() {
        let google = config.google.to_provider_config()?;
        println!("Google client is valid (calendar: {}).", google.calendar_id);
    } else {
        println!("No Google client configured; focus sessions run with --no-sync only.");
    }

    crate::context::secret_store(config)?;

    let settings = config.timer_settings();
    println!(
        "Timer: {} min focus, {} min break.",
        settings.pomodoro_minutes, settings.short_break_minutes
    );
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}
