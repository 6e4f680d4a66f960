//! The `UserSession` handle UI code works with.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use better_auth_bridge_core::{
    AccessDecision, AuthClient, AuthError, AuthResult, AuthSession, AuthUser, ClientResponse,
    GetSessionOptions, ModuleOptions, Redirects, RouteRules, SignInEmail, SignInSocial,
    SignUpEmail,
};

use super::state::{SessionSnapshot, SessionState};

/// Where a `UserSession` lives.
#[derive(Clone)]
pub enum ExecutionContext {
    /// Rendering a request on the server. Interactive operations are refused.
    Server,
    /// An interactive session driving the auth client.
    Client(Arc<dyn AuthClient>),
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("Server"),
            Self::Client(_) => f.write_str("Client"),
        }
    }
}

/// Continuation run after a successful sign-in or sign-up.
pub type OnSuccess =
    Box<dyn FnOnce(ClientResponse) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Per-call options of the sign-in and sign-up wrappers.
#[derive(Default)]
pub struct AuthCallOptions {
    on_success: Option<OnSuccess>,
}

impl AuthCallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once the call succeeded and the new session reached
    /// the shared state (or the session wait timed out).
    pub fn on_success<F, Fut>(mut self, callback: F) -> Self
    where
        F: FnOnce(ClientResponse) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_success = Some(Box::new(move |response| Box::pin(callback(response))));
        self
    }
}

/// Options of [`UserSession::fetch_session`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Headers to forward, typically the incoming `cookie`.
    pub headers: Option<HashMap<String, String>>,
    /// Bypass the auth library's cookie cache.
    pub force: bool,
}

/// Observer task mirroring the client's session store. Aborted when the last
/// `UserSession` clone goes away.
struct SessionSync(JoinHandle<()>);

impl Drop for SessionSync {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Reactive session handle.
#[derive(Clone)]
pub struct UserSession {
    state: SessionState,
    context: ExecutionContext,
    wait_timeout: Duration,
    redirects: Redirects,
    _sync: Option<Arc<SessionSync>>,
}

impl UserSession {
    /// Session handle for server rendering.
    pub fn server(state: SessionState, options: &ModuleOptions) -> Self {
        Self {
            state,
            context: ExecutionContext::Server,
            wait_timeout: options.session_wait_timeout,
            redirects: options.redirects.clone(),
            _sync: None,
        }
    }

    /// Session handle for an interactive session.
    ///
    /// Registers the single observer on `client.use_session()` that keeps
    /// `state` in step with the client's store. Must be called inside a tokio
    /// runtime.
    pub fn bind(state: SessionState, client: Arc<dyn AuthClient>, options: &ModuleOptions) -> Self {
        let mut upstream = client.use_session();
        state.apply_upstream(&upstream.borrow_and_update());

        let observed = state.clone();
        let handle = tokio::spawn(async move {
            while upstream.changed().await.is_ok() {
                let value = upstream.borrow_and_update().clone();
                observed.apply_upstream(&value);
            }
            debug!("Auth client session store closed");
        });

        Self {
            state,
            context: ExecutionContext::Client(client),
            wait_timeout: options.session_wait_timeout,
            redirects: options.redirects.clone(),
            _sync: Some(Arc::new(SessionSync(handle))),
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn is_client(&self) -> bool {
        matches!(self.context, ExecutionContext::Client(_))
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.state.snapshot().session
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state.snapshot().user
    }

    pub fn logged_in(&self) -> bool {
        self.state.logged_in()
    }

    pub fn ready(&self) -> bool {
        self.state.ready()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    pub fn clear_session(&self) {
        self.state.clear();
    }

    pub fn update_user(&self, patch: Map<String, Value>) {
        self.state.update_user(patch);
    }

    /// Wait until somebody is signed in, at most the configured timeout.
    ///
    /// Returns immediately when already logged in. A timeout is logged and
    /// otherwise ignored.
    pub async fn wait_for_session(&self) {
        let mut rx = self.state.subscribe();
        if rx.borrow_and_update().logged_in() {
            return;
        }

        match tokio::time::timeout(self.wait_timeout, rx.wait_for(SessionSnapshot::logged_in)).await
        {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => debug!("Session state dropped while waiting"),
            Err(_) => warn!(
                timeout_ms = self.wait_timeout.as_millis() as u64,
                "Timed out waiting for session"
            ),
        }
    }

    /// Refresh the shared state from the auth library.
    ///
    /// On the server this only marks the state ready; the session was already
    /// resolved while rendering. On the client a failed lookup leaves the
    /// user logged out. Either way the state is ready afterwards.
    pub async fn fetch_session(&self, options: FetchOptions) {
        let client = match &self.context {
            ExecutionContext::Server => {
                self.state.mark_ready();
                return;
            }
            ExecutionContext::Client(client) => client,
        };

        let request = GetSessionOptions {
            headers: options.headers,
            disable_cookie_cache: options.force,
        };
        match client.get_session(&request).await {
            Ok(data) => self.state.resolve(data),
            Err(err) => {
                error!(error = %err, "Failed to fetch auth session");
                self.state.resolve(None);
            }
        }
    }

    pub async fn sign_in_email(
        &self,
        body: &SignInEmail,
        options: AuthCallOptions,
    ) -> AuthResult<ClientResponse> {
        let client = self.client("signIn.email")?;
        let response = client.sign_in_email(body).await?;
        self.after_success(response, options).await
    }

    pub async fn sign_in_social(
        &self,
        body: &SignInSocial,
        options: AuthCallOptions,
    ) -> AuthResult<ClientResponse> {
        let client = self.client("signIn.social")?;
        let response = client.sign_in_social(body).await?;
        self.after_success(response, options).await
    }

    pub async fn sign_up_email(
        &self,
        body: &SignUpEmail,
        options: AuthCallOptions,
    ) -> AuthResult<ClientResponse> {
        let client = self.client("signUp.email")?;
        let response = client.sign_up_email(body).await?;
        self.after_success(response, options).await
    }

    /// Sign out through the client, then clear the local state.
    pub async fn sign_out(&self) -> AuthResult<ClientResponse> {
        let client = self.client("signOut")?;
        let response = client.sign_out().await?;
        self.state.clear();
        Ok(response)
    }

    /// Decide whether the current user may navigate to `path`.
    pub fn check_route(&self, rules: &RouteRules, path: &str) -> AccessDecision {
        let snapshot = self.state.snapshot();
        let user = snapshot.logged_in().then_some(snapshot.user.as_ref()).flatten();
        rules.check(path, user, &self.redirects)
    }

    fn client(&self, operation: &'static str) -> AuthResult<&Arc<dyn AuthClient>> {
        match &self.context {
            ExecutionContext::Client(client) => Ok(client),
            ExecutionContext::Server => Err(AuthError::ClientOnly(operation)),
        }
    }

    async fn after_success(
        &self,
        response: ClientResponse,
        options: AuthCallOptions,
    ) -> AuthResult<ClientResponse> {
        if let Some(on_success) = options.on_success {
            self.wait_for_session().await;
            on_success(response.clone()).await;
        }
        Ok(response)
    }
}
