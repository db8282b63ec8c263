//! OAuth error types.

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur while acquiring or refreshing credentials.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The token endpoint answered with a non-success status and no OAuth error body.
    #[error("Token endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse response from the OAuth provider.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The user did not complete the browser authorization in time.
    #[error("Authorization expired. Please try again.")]
    Expired,

    /// User denied the authorization request.
    #[error("Authorization was denied by the user.")]
    AccessDenied,

    /// Invalid state parameter (CSRF protection failed).
    #[error("Invalid state parameter. This may be a CSRF attack.")]
    InvalidState,

    /// The callback listener failed.
    #[error("Callback server error: {0}")]
    Server(String),

    /// Client id or secret missing.
    #[error("OAuth configuration error: {0}")]
    Configuration(String),

    /// The provider rejected the request (e.g. `invalid_grant`, `invalid_client`).
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },
}

impl OAuthError {
    /// Create a provider-specific error.
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Create a Google-specific error.
    pub fn google(message: impl Into<String>) -> Self {
        Self::provider("Google", message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OAuthError::Http(_) | OAuthError::Status { .. } | OAuthError::Server(_) => {
                ErrorKind::Transport
            }
            OAuthError::Expired => ErrorKind::Timeout,
            OAuthError::Configuration(_) => ErrorKind::Config,
            OAuthError::Parse(_)
            | OAuthError::AccessDenied
            | OAuthError::InvalidState
            | OAuthError::Provider { .. } => ErrorKind::Auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_helper_sets_provider_and_message() {
        let err = OAuthError::google("invalid_grant");
        match &err {
            OAuthError::Provider { provider, message } => {
                assert_eq!(*provider, "Google");
                assert_eq!(message, "invalid_grant");
            }
            other => panic!("expected Provider variant, got {other:?}"),
        }
        assert_eq!(err.to_string(), "Google error: invalid_grant");
    }

    #[test]
    fn display_messages_cover_simple_variants() {
        assert_eq!(
            OAuthError::Expired.to_string(),
            "Authorization expired. Please try again."
        );
        assert_eq!(
            OAuthError::AccessDenied.to_string(),
            "Authorization was denied by the user."
        );
        assert_eq!(
            OAuthError::Status {
                status: 503,
                body: "unavailable".to_string()
            }
            .to_string(),
            "Token endpoint returned 503: unavailable"
        );
        assert_eq!(
            OAuthError::Configuration("missing client id".to_string()).to_string(),
            "OAuth configuration error: missing client id"
        );
    }

    #[test]
    fn kinds_follow_failure_modes() {
        assert_eq!(OAuthError::Expired.kind(), ErrorKind::Timeout);
        assert_eq!(OAuthError::AccessDenied.kind(), ErrorKind::Auth);
        assert_eq!(OAuthError::google("invalid_client").kind(), ErrorKind::Auth);
        assert_eq!(OAuthError::Server("bind".into()).kind(), ErrorKind::Transport);
        assert_eq!(
            OAuthError::Status {
                status: 500,
                body: String::new()
            }
            .kind(),
            ErrorKind::Transport
        );
    }

    #[tokio::test]
    async fn http_variant_formats_as_http_request_failed() {
        // Use an invalid URL so we fail immediately without real network I/O.
        let err = reqwest::Client::new()
            .get("http://")
            .send()
            .await
            .expect_err("invalid URL should error");
        let oauth: OAuthError = err.into();
        assert!(oauth.to_string().contains("HTTP request failed:"));
        assert_eq!(oauth.kind(), ErrorKind::Transport);
    }
}
