//! calodoro CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calodoro_client::cli::{AuthAction, Cli, Command, ConfigAction};
use calodoro_client::commands;
use calodoro_client::commands::focus::FocusOptions;
use calodoro_client::config::ClientConfig;
use calodoro_client::error::ClientResult;
use calodoro_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    match cli.command {
        Command::Auth { action } => match action {
            AuthAction::Login { no_browser, force } => {
                commands::auth::login(&config, no_browser, force).await
            }
            AuthAction::Logout => commands::auth::logout(&config),
            AuthAction::Status => commands::auth::status(&config),
        },
        Command::Events { json } => commands::events::list(&config, json).await,
        Command::Placeholder { title } => commands::events::placeholder(&config, &title).await,
        Command::Focus {
            title,
            mode,
            event,
            placeholder,
            no_sync,
        } => {
            let options = FocusOptions {
                title,
                mode,
                event,
                placeholder,
                no_sync,
            };
            commands::focus::run(&config, options).await
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
