//! Sign-in commands.

use calodoro_providers::google::TokenStore;
use calodoro_providers::{AuthError, LoopbackPresenter};
use chrono::{Local, Utc};
use tracing::info;

use crate::config::ClientConfig;
use crate::context::{Services, secret_store};
use crate::error::ClientResult;

/// Runs the browser sign-in. Ctrl-C cancels the wait for the redirect.
pub async fn login(config: &ClientConfig, no_browser: bool, force: bool) -> ClientResult<()> {
    let mut presenter = LoopbackPresenter::new();
    if no_browser {
        presenter = presenter.without_browser();
    }
    let cancel = presenter.cancel_handle();
    let services = Services::new(config, presenter)?;

    if services.auth.is_signed_in() && !force {
        println!("Already signed in to Google Calendar.");
        println!("Use --force to sign in again.");
        return Ok(());
    }

    println!("Starting Google Calendar sign-in...");
    println!("Press Ctrl-C to cancel.");

    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let result = services.auth.sign_in().await;
    watcher.abort();

    match result {
        Ok(()) => {
            info!("google sign-in complete");
            println!("Signed in. Your Google Calendar credential has been saved.");
            Ok(())
        }
        Err(AuthError::UserCanceled) => {
            println!("Sign-in canceled.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Signs out, deleting the stored credential.
pub fn logout(config: &ClientConfig) -> ClientResult<()> {
    let services = Services::new(config, LoopbackPresenter::new().without_browser())?;
    services.auth.sign_out();
    println!("Signed out.");
    Ok(())
}

/// Reports whether a credential is stored and when its access token expires.
pub fn status(config: &ClientConfig) -> ClientResult<()> {
    match TokenStore::new(secret_store(config)?).load()? {
        None => println!("Signed out."),
        Some(credential) => {
            println!("Signed in.");
            let expires = credential.expires_at.with_timezone(&Local);
            if credential.expires_at > Utc::now() {
                println!("Access token valid until {}.", expires.format("%Y-%m-%d %H:%M"));
            } else {
                println!("Access token expired at {}.", expires.format("%Y-%m-%d %H:%M"));
            }
            if !credential.has_refresh_token() {
                println!("No refresh token stored; sign in again when it expires.");
            }
        }
    }
    Ok(())
}
