//! Call contract of the wrapped auth library.
//!
//! The bridge never authenticates anyone itself. The server side talks to an
//! [`AuthInstance`] built by an [`AuthFactory`]; the interactive side talks
//! to an [`AuthClient`] and observes its reactive session store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use validator::Validate;

use crate::config::DEFAULT_BASE_PATH;
use crate::error::{AuthError, AuthResult};
use crate::options::AuthOptions;
use crate::types::{AuthRequest, AuthResponse, HttpMethod, SessionData, UpstreamSession};

/// Headers forwarded when asking the library for the current session.
pub const SESSION_HEADERS: &[&str] = &["cookie", "authorization"];

/// A configured auth library instance.
#[async_trait]
pub trait AuthInstance: Send + Sync {
    /// Path prefix the instance expects its routes under.
    fn base_path(&self) -> &str {
        DEFAULT_BASE_PATH
    }

    /// Handle one request addressed to `{base_path}/...`.
    async fn handler(&self, req: AuthRequest) -> AuthResponse;

    /// Resolve the session carried by `headers`.
    ///
    /// The default routes a `GET {base_path}/get-session` through
    /// [`handler`](AuthInstance::handler), forwarding only the session headers.
    async fn get_session(
        &self,
        headers: &HashMap<String, String>,
    ) -> AuthResult<Option<SessionData>> {
        let mut req = AuthRequest::new(
            HttpMethod::Get,
            format!("{}/get-session", self.base_path()),
        );
        for name in SESSION_HEADERS {
            if let Some(value) = headers.get(*name) {
                req.headers.insert((*name).to_string(), value.clone());
            }
        }

        let response = self.handler(req).await;
        decode_session_response(&response)
    }
}

/// Parse a `get-session` response: `{ session, user }` or `null`.
pub fn decode_session_response(response: &AuthResponse) -> AuthResult<Option<SessionData>> {
    if !response.is_success() {
        return Err(AuthError::upstream(response.status, response.message()));
    }
    if response.body.is_empty() {
        return Ok(None);
    }
    response.json_body()
}

/// Constructor of auth library instances.
pub trait AuthFactory<DB>: Send + Sync {
    fn create(&self, options: AuthOptions<DB>) -> AuthResult<Arc<dyn AuthInstance>>;
}

impl<DB, F> AuthFactory<DB> for F
where
    F: Fn(AuthOptions<DB>) -> AuthResult<Arc<dyn AuthInstance>> + Send + Sync,
{
    fn create(&self, options: AuthOptions<DB>) -> AuthResult<Arc<dyn AuthInstance>> {
        self(options)
    }
}

/// Body of `POST /sign-in/email`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignInEmail {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[serde(rename = "rememberMe", skip_serializing_if = "Option::is_none")]
    pub remember_me: Option<bool>,
    #[serde(rename = "callbackURL", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Body of `POST /sign-up/email`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignUpEmail {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "callbackURL", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// Body of `POST /sign-in/social`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignInSocial {
    #[validate(length(min = 1, message = "Provider is required"))]
    pub provider: String,
    #[serde(rename = "callbackURL", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl SignInEmail {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            remember_me: None,
            callback_url: None,
        }
    }
}

impl SignUpEmail {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: name.into(),
            image: None,
            callback_url: None,
        }
    }
}

impl SignInSocial {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            callback_url: None,
        }
    }
}

/// Successful response of a client call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientResponse {
    pub status: u16,
    pub data: Value,
}

/// Options for [`AuthClient::get_session`].
#[derive(Debug, Clone, Default)]
pub struct GetSessionOptions {
    /// Extra headers (typically a forwarded `cookie`).
    pub headers: Option<HashMap<String, String>>,
    /// Bypass the library's cookie cache.
    pub disable_cookie_cache: bool,
}

/// Interactive-side client of the auth library.
///
/// Failed calls surface as `Err`; a non-2xx endpoint answer is
/// [`AuthError::Upstream`].
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn get_session(&self, options: &GetSessionOptions) -> AuthResult<Option<SessionData>>;

    async fn sign_in_email(&self, body: &SignInEmail) -> AuthResult<ClientResponse>;

    async fn sign_in_social(&self, body: &SignInSocial) -> AuthResult<ClientResponse>;

    async fn sign_up_email(&self, body: &SignUpEmail) -> AuthResult<ClientResponse>;

    async fn sign_out(&self) -> AuthResult<ClientResponse>;

    /// Subscribe to the library's reactive session store.
    fn use_session(&self) -> watch::Receiver<UpstreamSession>;
}
