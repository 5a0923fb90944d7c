//! CLI, configuration and command implementations
//!
//! This crate provides the `calodoro` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
