//! Auth client for the dashboard backend.
//!
//! `AuthService` performs the login/register exchanges, owns the
//! `TokenStore`, and wraps every authorized call so that a 401 ends the
//! local session and is announced on the session event channel.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::auth::{Claims, TokenStore, User};

use super::error::{LOGIN_FAILED_MESSAGE, REGISTRATION_FAILED_MESSAGE};
use super::AuthError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";
const VERIFY_PATH: &str = "/api/auth/verify";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Buffered session events per subscriber before the oldest are dropped
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session lifecycle notifications emitted by `AuthService`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn(User),
    LoggedOut,
    /// An authorized call was rejected with 401 and the token was cleared
    Expired,
}

/// Token and user returned by a successful login or registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSuccess {
    pub token: String,
    pub user: User,
}

/// Per-call options for `AuthService::authorized_request`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    /// Merged over the default headers; entries here win
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    success: bool,
}

/// Client for the backend's auth endpoints and authorized calls.
///
/// One instance lives for the whole application session and is shared
/// behind an `Arc`. Clone is cheap but clones share the token store and
/// the event channel.
#[derive(Clone)]
pub struct AuthService {
    client: Client,
    base_url: String,
    store: TokenStore,
    events: broadcast::Sender<SessionEvent>,
}

impl AuthService {
    pub fn new(base_url: &str, store: TokenStore) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ========================================================================
    // Credential exchanges
    // ========================================================================

    /// Sign in and persist the returned token.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginSuccess, AuthError> {
        let success = self.fetch_login(username, password).await?;
        self.commit_sign_in(&success)?;
        Ok(success)
    }

    /// Create an account and persist the returned token.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<LoginSuccess, AuthError> {
        let success = self.fetch_registration(username, email, password).await?;
        self.commit_sign_in(&success)?;
        Ok(success)
    }

    /// Login exchange only. Nothing is stored until `commit_sign_in`.
    pub async fn fetch_login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginSuccess, AuthError> {
        let body = LoginRequest { username, password };
        self.exchange(LOGIN_PATH, &body, AuthError::LoginFailed, LOGIN_FAILED_MESSAGE)
            .await
    }

    /// Register exchange only. Nothing is stored until `commit_sign_in`.
    pub async fn fetch_registration(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<LoginSuccess, AuthError> {
        let body = RegisterRequest {
            username,
            email,
            password,
        };
        self.exchange(
            REGISTER_PATH,
            &body,
            AuthError::RegistrationFailed,
            REGISTRATION_FAILED_MESSAGE,
        )
        .await
    }

    /// Persist a fetched sign-in and announce it.
    pub fn commit_sign_in(&self, success: &LoginSuccess) -> Result<(), AuthError> {
        self.store
            .set_token(&success.token)
            .map_err(AuthError::storage)?;
        info!(username = %success.user.username, "Signed in");
        self.emit(SessionEvent::LoggedIn(success.user.clone()));
        Ok(())
    }

    /// Shared login/register exchange: POST credentials, validate the reply.
    async fn exchange<B: Serialize>(
        &self,
        path: &str,
        body: &B,
        rejected: fn(String) -> AuthError,
        fallback_message: &str,
    ) -> Result<LoginSuccess, AuthError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message =
                AuthError::server_message(&body).unwrap_or_else(|| fallback_message.to_string());
            warn!(%status, path, "Credentials rejected");
            return Err(rejected(message));
        }

        let auth: AuthResponse = response.json().await?;
        let token = match auth.token {
            Some(token) if auth.success && !token.is_empty() => token,
            _ => {
                warn!(path, "Success response without a token");
                return Err(AuthError::InvalidServerResponse);
            }
        };

        let user = Self::resolve_user(&token, auth.user).ok_or(AuthError::InvalidServerResponse)?;
        Ok(LoginSuccess { token, user })
    }

    /// The token's claims name the user; the body's `user` is only a fallback.
    fn resolve_user(token: &str, reported: Option<User>) -> Option<User> {
        match (Claims::decode(token).map(|c| c.user()), reported) {
            (Some(from_token), Some(reported)) => {
                if from_token != reported {
                    warn!(
                        token_user = %from_token.username,
                        reported_user = %reported.username,
                        "Response user disagrees with token claims, using the token"
                    );
                }
                Some(from_token)
            }
            (from_token, reported) => from_token.or(reported),
        }
    }

    /// Ask the backend whether the stored token is still accepted.
    ///
    /// Never fails: no token, transport errors and unexpected bodies all
    /// report `false`. Local state is left alone either way.
    pub async fn verify_session(&self) -> bool {
        let Some(token) = self.store.get_token() else {
            return false;
        };

        match self.verify_token(&token).await {
            Ok(accepted) => accepted,
            Err(e) => {
                debug!(error = %e, "Session verification failed");
                false
            }
        }
    }

    async fn verify_token(&self, token: &str) -> Result<bool, reqwest::Error> {
        let response = self
            .client
            .get(self.url(VERIFY_PATH))
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let body: VerifyResponse = response.json().await?;
        Ok(body.success)
    }

    /// End the session locally. No network call.
    pub fn logout(&self) {
        self.clear_token();
        info!("Signed out");
        self.emit(SessionEvent::LoggedOut);
    }

    fn clear_token(&self) {
        if let Err(e) = self.store.remove_token() {
            warn!(error = %e, "Failed to remove session token");
        }
    }

    // ========================================================================
    // Authorized calls
    // ========================================================================

    fn auth_headers(token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(_) => warn!("Stored token is not a valid header value, sending without it"),
            }
        }
        headers
    }

    /// Issue `options` against `{base_url}{path}` with the bearer token attached.
    ///
    /// A 401 clears the token, emits `SessionEvent::Expired` and fails with
    /// `SessionExpired`. If the stored token changed while the request was in
    /// flight, the newer session is kept and the 401 is reported as a plain
    /// `RequestFailed`. Every other response is returned as-is.
    pub async fn authorized_request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response, AuthError> {
        let sent_token = self.store.get_token();
        let mut headers = Self::auth_headers(sent_token.as_deref());
        headers.extend(options.headers);

        let mut request = self
            .client
            .request(options.method, self.url(path))
            .headers(headers);
        if let Some(ref body) = options.body {
            request = request.json(body);
        }

        let response = request.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if self.store.get_token() != sent_token {
                debug!(path, "401 for a token that has since been replaced, keeping session");
                let body = response.text().await.unwrap_or_default();
                return Err(AuthError::RequestFailed {
                    status: StatusCode::UNAUTHORIZED,
                    message: AuthError::server_message(&body)
                        .unwrap_or_else(|| AuthError::truncate_body(&body)),
                });
            }
            warn!(path, "Authorized request rejected, ending session");
            self.clear_token();
            self.emit(SessionEvent::Expired);
            return Err(AuthError::SessionExpired);
        }

        Ok(response)
    }

    /// Authorized GET that requires a success status and a JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AuthError> {
        let response = self.authorized_request(path, RequestOptions::get()).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::from_status(status, &body));
        }

        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("base_url", &self.base_url)
            .field("store", &self.store)
            .finish()
    }
}
