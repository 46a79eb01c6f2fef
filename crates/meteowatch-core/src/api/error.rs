use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Server rejected the credentials; carries the server's text verbatim
    #[error("{0}")]
    LoginFailed(String),

    #[error("{0}")]
    RegistrationFailed(String),

    #[error("Invalid response from server")]
    InvalidServerResponse,

    #[error("Session expired. Please login again.")]
    SessionExpired,

    #[error("Request failed ({status}): {message}")]
    RequestFailed { status: StatusCode, message: String },

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("A sign-in request is already in progress")]
    Busy,

    #[error("Sign-in was superseded by a newer session change")]
    Superseded,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Fallback texts when the server gives no `error` field
pub(crate) const LOGIN_FAILED_MESSAGE: &str = "Login failed";
pub(crate) const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed";

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!(
            "{}... (truncated, {} total bytes)",
            &body[..end],
            body.len()
        )
    }

    /// The `error` string of a JSON error body, if there is one
    pub(crate) fn server_message(body: &str) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()?
            .get("error")?
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED {
            return AuthError::SessionExpired;
        }
        let message = Self::server_message(body).unwrap_or_else(|| Self::truncate_body(body));
        AuthError::RequestFailed { status, message }
    }

    pub(crate) fn storage(e: anyhow::Error) -> Self {
        AuthError::Storage(format!("{:#}", e))
    }

    /// True when the caller should send the user back to the login view
    pub fn requires_login(&self) -> bool {
        matches!(self, AuthError::SessionExpired)
    }

    /// Text suitable for showing next to a login or registration form
    pub fn user_message(&self) -> String {
        match self {
            AuthError::LoginFailed(msg) | AuthError::RegistrationFailed(msg) => msg.clone(),
            AuthError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            AuthError::NetworkError(e) if e.is_connect() => {
                "Unable to connect to server. Check your connection.".to_string()
            }
            other => other.to_string(),
        }
    }
}
