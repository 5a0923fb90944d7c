//! Interactive authorization presenters.
//!
//! An [`AuthorizationPresenter`] shows the provider's consent page to the
//! user and hands back the URL the provider redirected to. The
//! [`LoopbackPresenter`] does this with the system browser and a one-shot
//! HTTP listener on the redirect address.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};
use crate::gateway::BoxFuture;

/// How long the loopback listener waits for the redirect.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
    <html><body><h1>Signed in to Calodoro</h1>\
    <p>You can close this window and return to the terminal.</p></body></html>";

const FAILURE_PAGE: &str = "HTTP/1.1 400 Bad Request\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
    <html><body><h1>Authorization Failed</h1>\
    <p>You can close this window.</p></body></html>";

const NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

/// Presents an authorization URL and waits for the redirect.
pub trait AuthorizationPresenter: Send + Sync {
    /// Opens `auth_url` and resolves with the first callback URL that starts
    /// with `callback_prefix`.
    ///
    /// Fails with [`AuthError::UserCanceled`] when the user dismisses the
    /// session.
    fn present<'a>(
        &'a self,
        auth_url: &'a str,
        callback_prefix: &'a str,
    ) -> BoxFuture<'a, AuthResult<String>>;
}

/// Cancels an in-flight interactive sign-in.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    notify: Arc<Notify>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the waiting presenter with [`AuthError::UserCanceled`].
    ///
    /// A cancel issued before the presenter starts waiting is kept and
    /// applies to the next wait.
    pub fn cancel(&self) {
        self.notify.notify_one();
    }

    async fn canceled(&self) {
        self.notify.notified().await;
    }
}

/// Opens the system browser and receives the redirect on a local listener.
#[derive(Debug, Clone)]
pub struct LoopbackPresenter {
    timeout: Duration,
    cancel: CancelHandle,
    open_browser: bool,
}

impl LoopbackPresenter {
    pub fn new() -> Self {
        Self {
            timeout: CALLBACK_TIMEOUT,
            cancel: CancelHandle::new(),
            open_browser: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables launching the browser; the URL is only printed.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    /// Returns a handle that cancels the sign-in from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    async fn run(&self, auth_url: &str, callback_prefix: &str) -> AuthResult<String> {
        let redirect = Url::parse(callback_prefix).map_err(|_| AuthError::MissingConfiguration)?;
        let host = redirect
            .host_str()
            .ok_or(AuthError::MissingConfiguration)?
            .to_string();
        let port = redirect
            .port_or_known_default()
            .ok_or(AuthError::MissingConfiguration)?;

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|e| {
                AuthError::Presentation(format!("cannot listen on {}:{}: {}", host, port, e))
            })?;
        debug!(%host, port, "loopback listener ready");

        if self.open_browser {
            info!("opening browser for sign-in");
            if let Err(e) = open::that(auth_url) {
                warn!(error = %e, "failed to open browser");
                eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
            }
        } else {
            eprintln!("\nPlease open this URL in your browser:\n\n{}\n", auth_url);
        }

        let base = format!("http://{}:{}", host, port);
        let expected_path = redirect.path().to_string();

        tokio::select! {
            result = accept_callback(&listener, &base, &expected_path) => result,
            _ = tokio::time::sleep(self.timeout) => Err(AuthError::CallbackTimeout),
            _ = self.cancel.canceled() => {
                info!("sign-in canceled");
                Err(AuthError::UserCanceled)
            }
        }
    }
}

impl Default for LoopbackPresenter {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorizationPresenter for LoopbackPresenter {
    fn present<'a>(
        &'a self,
        auth_url: &'a str,
        callback_prefix: &'a str,
    ) -> BoxFuture<'a, AuthResult<String>> {
        Box::pin(self.run(auth_url, callback_prefix))
    }
}

/// Accepts connections until one requests the redirect path.
async fn accept_callback(
    listener: &TcpListener,
    base: &str,
    expected_path: &str,
) -> AuthResult<String> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| AuthError::Presentation(format!("accept failed: {}", e)))?;
        debug!(%peer, "callback connection");

        if let Some(target) = handle_connection(stream, expected_path).await {
            return Ok(format!("{}{}", base, target));
        }
    }
}

/// Reads the request head and answers the browser.
///
/// Returns the request target when it is a GET for `expected_path`.
async fn handle_connection(stream: TcpStream, expected_path: &str) -> Option<String> {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;

    // Drain headers so closing the socket does not reset the connection.
    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header).await {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim().is_empty() => break,
            Ok(_) => {}
        }
    }

    // GET /oauth2callback?code=...&state=... HTTP/1.1
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let target = parts.next()?.to_string();
    let path = target.split('?').next().unwrap_or_default();

    let mut stream = reader.into_inner();
    if method != "GET" || path != expected_path {
        let _ = stream.write_all(NOT_FOUND.as_bytes()).await;
        let _ = stream.shutdown().await;
        return None;
    }

    let ok = target.contains("code=") && !target.contains("error=");
    let page = if ok { SUCCESS_PAGE } else { FAILURE_PAGE };
    let _ = stream.write_all(page.as_bytes()).await;
    let _ = stream.shutdown().await;

    Some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn free_port() -> u16 {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        listener.local_addr().unwrap().port()
    }

    async fn send(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn wait_for_listener(port: u16) {
        for _ in 0..50 {
            if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("listener never came up");
    }

    #[tokio::test]
    async fn loopback_returns_callback_url() {
        let port = free_port().await;
        let prefix = format!("http://127.0.0.1:{}/oauth2callback", port);
        let presenter = LoopbackPresenter::new().without_browser();

        let browser = tokio::spawn(async move {
            wait_for_listener(port).await;
            let other = send(port, "/favicon.ico").await;
            assert!(other.starts_with("HTTP/1.1 404"));
            send(port, "/oauth2callback?code=abc&state=xyz").await
        });

        let url = presenter.present("http://auth", &prefix).await.unwrap();
        assert_eq!(url, format!("{}?code=abc&state=xyz", prefix));

        let page = browser.await.unwrap();
        assert!(page.starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn loopback_can_be_canceled() {
        let port = free_port().await;
        let prefix = format!("http://127.0.0.1:{}/oauth2callback", port);
        let presenter = LoopbackPresenter::new().without_browser();
        let cancel = presenter.cancel_handle();
        cancel.cancel();

        let err = presenter.present("http://auth", &prefix).await.unwrap_err();
        assert!(matches!(err, AuthError::UserCanceled));
    }

    #[tokio::test]
    async fn loopback_times_out() {
        let port = free_port().await;
        let prefix = format!("http://127.0.0.1:{}/oauth2callback", port);
        let presenter = LoopbackPresenter::new()
            .without_browser()
            .with_timeout(Duration::from_millis(50));

        let err = presenter.present("http://auth", &prefix).await.unwrap_err();
        assert!(matches!(err, AuthError::CallbackTimeout));
    }

    #[tokio::test]
    async fn unparseable_redirect_is_configuration_error() {
        let presenter = LoopbackPresenter::new().without_browser();
        let err = presenter.present("http://auth", "not a url").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingConfiguration));
    }
}
