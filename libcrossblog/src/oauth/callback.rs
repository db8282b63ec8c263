//! Local callback listener for the authorization-code flow.
//!
//! The listener is bound before the authorization URL is shown, serves exactly
//! one `/callback` redirect, and is released on every exit path: code
//! received, provider error, or timeout.

use super::error::OAuthError;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

/// Default port for the OAuth callback listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;

/// Upper bound on draining the last response after the code arrived.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Build the redirect URI for the callback listener.
pub fn redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{}/callback", port)
}

/// Query parameters received in the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

struct CallbackState {
    expected_state: String,
    tx: Option<oneshot::Sender<Result<String, OAuthError>>>,
}

/// A bound callback listener waiting for a single redirect.
pub struct CallbackServer {
    listener: TcpListener,
    expected_state: String,
}

impl CallbackServer {
    /// Bind `127.0.0.1:{port}`. Port 0 picks a free port (see [`CallbackServer::port`]).
    pub async fn bind(port: u16, expected_state: impl Into<String>) -> Result<Self, OAuthError> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| OAuthError::Server(format!("Failed to bind to port {}: {}", port, e)))?;

        Ok(Self {
            listener,
            expected_state: expected_state.into(),
        })
    }

    /// The port actually bound.
    pub fn port(&self) -> u16 {
        self.listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or_default()
    }

    /// Serve until the provider redirects back or `timeout` elapses.
    ///
    /// Returns the authorization code, [`OAuthError::Expired`] on timeout,
    /// [`OAuthError::AccessDenied`] / [`OAuthError::InvalidState`] for a bad
    /// redirect. The listener is closed before this returns.
    pub async fn wait_for_code(self, timeout: Duration) -> Result<String, OAuthError> {
        let (tx, rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(Mutex::new(CallbackState {
            expected_state: self.expected_state,
            tx: Some(tx),
        }));

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(state);

        tracing::debug!(
            addr = ?self.listener.local_addr().ok(),
            "OAuth callback listener waiting for redirect"
        );

        let listener = self.listener;
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let outcome = tokio::time::timeout(timeout, rx).await;

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "OAuth callback listener error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "OAuth callback listener task failed"),
            Err(_) => {
                tracing::warn!("OAuth callback listener did not shut down in time");
                server.abort();
            }
            Ok(Ok(Ok(()))) => {}
        }

        match outcome {
            Ok(Ok(code_result)) => code_result,
            Ok(Err(_)) => Err(OAuthError::Server(
                "Callback channel closed unexpectedly".into(),
            )),
            Err(_) => Err(OAuthError::Expired),
        }
    }
}

async fn handle_callback(
    State(state): State<Arc<Mutex<CallbackState>>>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let mut state = state.lock().await;

    let result = process_callback(&state.expected_state, params);
    let is_success = result.is_ok();

    if let Some(tx) = state.tx.take() {
        let _ = tx.send(result);
    }

    if is_success {
        Html(SUCCESS_HTML)
    } else {
        Html(ERROR_HTML)
    }
}

/// Validate the redirect and extract the authorization code.
fn process_callback(expected_state: &str, params: CallbackParams) -> Result<String, OAuthError> {
    if let Some(error) = params.error {
        if error == "access_denied" {
            return Err(OAuthError::AccessDenied);
        }
        let message = params.error_description.unwrap_or_else(|| error.clone());
        return Err(OAuthError::google(message));
    }

    match params.state {
        Some(ref state) if state == expected_state => {}
        _ => return Err(OAuthError::InvalidState),
    }

    params
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| OAuthError::Parse("Missing authorization code in callback".into()))
}

const SUCCESS_HTML: &str = "<!doctype html><html><body>\
<h1>Authorization complete</h1><p>You can close this window and return to the terminal.</p>\
</body></html>";

const ERROR_HTML: &str = "<!doctype html><html><body>\
<h1>Authorization failed</h1><p>Return to the terminal for details.</p>\
</body></html>";
