//! Interactive redirect capability and its loopback implementation.
//!
//! The login flow only needs "open this URL, give me back the URL the
//! provider finally redirected to". [`InteractiveRedirect`] is that
//! capability; [`LoopbackRedirect`] provides it for a desktop process by
//! opening the system browser and listening on the redirect target.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, error, info, warn};
use url::Url;

/// Default wait for the user to finish in the browser.
pub const DEFAULT_REDIRECT_TIMEOUT_SECS: u64 = 300;

/// Launch a user-visible authorization flow and await its terminal redirect.
#[async_trait]
pub trait InteractiveRedirect: Send + Sync {
    /// Returns the final redirect URL, or `None` when the user cancelled or
    /// the flow produced no redirect.
    async fn launch(&self, authorization_url: &Url) -> AuthResult<Option<String>>;
}

type ResultSender = Arc<Mutex<Option<oneshot::Sender<Option<String>>>>>;

/// Loopback listener on the redirect target.
///
/// Fragments never reach an HTTP server, so the callback path serves a
/// relay page that sends `location.hash` back on `<path>/fragment`. The
/// listener then rebuilds `<redirect_uri>#<fragment>`.
pub struct LoopbackRedirect {
    redirect_uri: Url,
    timeout: Duration,
    open_browser: bool,
}

impl LoopbackRedirect {
    /// Create a listener for `redirect_uri`, which must be an http URL with a
    /// host.
    pub fn new(redirect_uri: &str) -> AuthResult<Self> {
        let redirect_uri = Url::parse(redirect_uri)?;
        if redirect_uri.scheme() != "http" || redirect_uri.host_str().is_none() {
            return Err(AuthError::NotConfigured(format!(
                "Redirect URI must be a loopback http URL: {}",
                redirect_uri
            )));
        }

        Ok(Self {
            redirect_uri,
            timeout: Duration::from_secs(DEFAULT_REDIRECT_TIMEOUT_SECS),
            open_browser: true,
        })
    }

    /// Override the wait limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Do not open the system browser; the caller visits the URL itself.
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    fn bind_addr(&self) -> String {
        let host = self.redirect_uri.host_str().unwrap_or("127.0.0.1");
        let port = self.redirect_uri.port_or_known_default().unwrap_or(80);
        format!("{}:{}", host, port)
    }

    fn callback_path(&self) -> String {
        self.redirect_uri.path().to_string()
    }

    fn relay_path(&self) -> String {
        format!("{}/fragment", self.redirect_uri.path().trim_end_matches('/'))
    }
}

#[async_trait]
impl InteractiveRedirect for LoopbackRedirect {
    async fn launch(&self, authorization_url: &Url) -> AuthResult<Option<String>> {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            AuthError::FlowCancelledOrFailed(format!("Failed to bind to {}: {}", addr, e))
        })?;

        info!(addr = %addr, "Login callback listener ready");

        let (tx, rx) = oneshot::channel::<Option<String>>();
        let tx: ResultSender = Arc::new(Mutex::new(Some(tx)));
        let routes = Arc::new(Routes {
            redirect_uri: self.redirect_uri.clone(),
            callback_path: self.callback_path(),
            relay_path: self.relay_path(),
        });

        let server_handle = tokio::spawn({
            let tx = tx.clone();
            async move {
                loop {
                    match listener.accept().await {
                        Ok((mut socket, _)) => {
                            let tx = tx.clone();
                            let routes = routes.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(&mut socket, &routes, tx).await {
                                    error!("Error handling callback connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        if self.open_browser {
            if let Err(e) = open::that(authorization_url.as_str()) {
                warn!("Failed to open browser automatically: {}", e);
            }
        }
        info!(url = %authorization_url, "Complete the login in your browser");

        let result = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(redirect)) => redirect,
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Timed out waiting for login redirect"
                );
                None
            }
        };

        server_handle.abort();
        Ok(result)
    }
}

struct Routes {
    redirect_uri: Url,
    callback_path: String,
    relay_path: String,
}

impl Routes {
    fn terminal_url(&self, fragment: &str) -> String {
        let mut url = self.redirect_uri.clone();
        url.set_query(None);
        url.set_fragment(Some(fragment));
        url.to_string()
    }
}

/// Handle an incoming HTTP connection.
async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    routes: &Routes,
    tx: ResultSender,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received callback request");

    // Drain headers so closing the socket does not reset the connection.
    let mut header = String::new();
    while reader.read_line(&mut header).await? > 2 {
        header.clear();
    }

    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let Some(target) = request_target(&request_line) else {
        send_response(&mut writer, 400, "Bad Request", "Bad Request").await?;
        return Ok(());
    };
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    let redirect = if path == routes.relay_path {
        if query.is_empty() {
            send_response(&mut writer, 200, "OK", &error_page("No response from provider")).await?;
            None
        } else {
            send_response(&mut writer, 200, "OK", &success_page()).await?;
            Some(routes.terminal_url(query))
        }
    } else if path == routes.callback_path {
        if query.is_empty() {
            // Tokens are in the fragment; let the browser send them back.
            send_response(&mut writer, 200, "OK", &relay_page(&routes.relay_path)).await?;
            return Ok(());
        }
        // Provider errors may arrive as a query string.
        send_response(&mut writer, 200, "OK", &error_page("The provider reported an error")).await?;
        Some(routes.terminal_url(query))
    } else {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    };

    if let Some(tx) = tx.lock().await.take() {
        let _ = tx.send(redirect);
    }

    Ok(())
}

/// Target of a `METHOD target HTTP/x` request line.
fn request_target(request_line: &str) -> Option<&str> {
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(target), Some(version)) if version.starts_with("HTTP/") => Some(target),
        _ => None,
    }
}

/// Send an HTTP response.
async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

fn relay_page(relay_path: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Ah-Ha! - Completing Login</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px;">
<p>Completing login...</p>
<script>
var fragment = window.location.hash ? window.location.hash.substring(1) : "";
window.location.replace("{}?" + fragment);
</script>
</body>
</html>"#,
        relay_path
    )
}

fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Ah-Ha! - Login Received</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px;">
<h1 style="color: #22c55e;">Login received</h1>
<p style="color: #666;">You can close this window and return to the terminal.</p>
</div>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

fn error_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Ah-Ha! - Login Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px;">
<h1 style="color: #ef4444;">Login failed</h1>
<p style="color: #666;">{}</p>
<p style="color: #888; font-size: 14px;">You can close this window and try again.</p>
</div>
</body>
</html>"#,
        error
    )
}
