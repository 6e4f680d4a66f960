//! [`AuthClient`] over HTTP, talking to the auth routes of a running app.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::debug;
use url::Url;
use validator::Validate;

use better_auth_bridge_core::{
    AuthClient, AuthError, AuthResult, ClientResponse, GetSessionOptions, PublicRuntimeConfig,
    SessionData, SignInEmail, SignInSocial, SignUpEmail, UpstreamSession, DEFAULT_BASE_PATH,
};

/// HTTP auth client with its own cookie jar and reactive session store.
///
/// The store starts `Pending` and is updated by every session lookup,
/// sign-in, sign-up and sign-out made through this client.
#[derive(Clone)]
pub struct HttpAuthClient {
    http: reqwest::Client,
    base_url: Url,
    base_path: String,
    store: Arc<watch::Sender<UpstreamSession>>,
}

impl HttpAuthClient {
    /// Client for the app served at `base_url`.
    pub fn new(base_url: &str) -> AuthResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AuthError::config(format!("Invalid auth base URL {base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| AuthError::config(format!("Failed to build HTTP client: {e}")))?;
        let (store, _) = watch::channel(UpstreamSession::Pending);

        Ok(Self {
            http,
            base_url,
            base_path: DEFAULT_BASE_PATH.to_string(),
            store: Arc::new(store),
        })
    }

    /// Client for the configured site URL, falling back to the page origin.
    pub fn from_config(public: &PublicRuntimeConfig, origin: &str) -> AuthResult<Self> {
        Self::new(&public.resolve_base_url(origin))
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Current value of the session store.
    pub fn current(&self) -> UpstreamSession {
        self.store.borrow().clone()
    }

    /// Re-read the session and publish it to the store. Failures publish
    /// `Empty`.
    pub async fn refresh(&self) {
        if let Err(err) = self.get_session(&GetSessionOptions::default()).await {
            debug!(error = %err, "Session refresh failed");
            self.store.send_replace(UpstreamSession::Empty);
        }
    }

    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        let full = format!("{}{}", self.base_path.trim_end_matches('/'), path);
        self.base_url
            .join(&full)
            .map_err(|e| AuthError::config(format!("Invalid auth endpoint {full}: {e}")))
    }

    fn request(&self, method: Method, path: &str) -> AuthResult<RequestBuilder> {
        Ok(self.http.request(method, self.endpoint(path)?))
    }

    async fn send(&self, builder: RequestBuilder) -> AuthResult<ClientResponse> {
        let response = builder
            .send()
            .await
            .map_err(|e| AuthError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AuthError::transport(e.to_string()))?;

        let data = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        if !(200..300).contains(&status) {
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| data.to_string());
            return Err(AuthError::upstream(status, message));
        }

        Ok(ClientResponse { status, data })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> AuthResult<ClientResponse> {
        let builder = self.request(Method::POST, path)?.json(body);
        self.send(builder).await
    }
}

fn validate<T: Validate>(body: &T) -> AuthResult<()> {
    body.validate()
        .map_err(|e| AuthError::validation(e.to_string()))
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn get_session(&self, options: &GetSessionOptions) -> AuthResult<Option<SessionData>> {
        let mut builder = self.request(Method::GET, "/get-session")?;
        if options.disable_cookie_cache {
            builder = builder.query(&[("disableCookieCache", "true")]);
        }
        if let Some(headers) = &options.headers {
            for (name, value) in headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        let response = self.send(builder).await?;
        let data: Option<SessionData> = serde_json::from_value(response.data)?;

        self.store.send_replace(match &data {
            Some(data) => UpstreamSession::Present(data.clone()),
            None => UpstreamSession::Empty,
        });
        Ok(data)
    }

    async fn sign_in_email(&self, body: &SignInEmail) -> AuthResult<ClientResponse> {
        validate(body)?;
        let response = self.post_json("/sign-in/email", body).await?;
        self.refresh().await;
        Ok(response)
    }

    async fn sign_in_social(&self, body: &SignInSocial) -> AuthResult<ClientResponse> {
        validate(body)?;
        self.post_json("/sign-in/social", body).await
    }

    async fn sign_up_email(&self, body: &SignUpEmail) -> AuthResult<ClientResponse> {
        validate(body)?;
        let response = self.post_json("/sign-up/email", body).await?;
        self.refresh().await;
        Ok(response)
    }

    async fn sign_out(&self) -> AuthResult<ClientResponse> {
        let empty: HashMap<String, Value> = HashMap::new();
        let response = self.post_json("/sign-out", &empty).await?;
        self.store.send_replace(UpstreamSession::Empty);
        Ok(response)
    }

    fn use_session(&self) -> watch::Receiver<UpstreamSession> {
        self.store.subscribe()
    }
}
