//! Command-line interface definition.

use std::path::PathBuf;

use calodoro_core::TimerMode;
use clap::{Parser, Subcommand};

/// calodoro - focus sessions mirrored onto Google Calendar
#[derive(Debug, Parser)]
#[command(name = "calodoro")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALODORO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Google sign-in management
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// List today's calendar events
    Events {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create an all-day placeholder event for today
    Placeholder {
        /// Event title
        title: String,
    },

    /// Run a focus session in the terminal
    ///
    /// Type `p` to pause, `r` to resume and `s` to stop. The finished
    /// session is written to the calendar.
    Focus {
        /// Task title (ignored with --event, which uses the event's title)
        title: Option<String>,

        /// Timer mode: pomodoro or timer
        #[arg(long, short)]
        mode: Option<TimerMode>,

        /// Bind the session to an event from today's calendar
        #[arg(long, conflicts_with = "placeholder")]
        event: Option<String>,

        /// Create an all-day placeholder for today and bind the session to it
        #[arg(long)]
        placeholder: bool,

        /// Do not write the session to the calendar
        #[arg(long, conflicts_with_all = ["event", "placeholder"])]
        no_sync: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Sign-in actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Sign in with the browser
    Login {
        /// Print the authorization URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,

        /// Sign in again even when a credential is stored
        #[arg(long, short)]
        force: bool,
    },

    /// Forget the stored credential
    Logout,

    /// Show whether a credential is stored
    Status,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
