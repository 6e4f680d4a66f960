use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Default mount point of the auth library's routes.
pub const DEFAULT_BASE_PATH: &str = "/api/auth";

/// How long `wait_for_session` waits for a sign-in to propagate before
/// giving up.
pub const DEFAULT_SESSION_WAIT: Duration = Duration::from_millis(5000);

/// Application runtime configuration consumed by the bridge.
///
/// Mirrors the split between server-only values (`secret`) and values that
/// are safe to ship to the browser (`public`).
#[derive(Clone)]
pub struct RuntimeConfig {
    /// Secret handed to the auth library for signing tokens and cookies.
    pub secret: String,

    /// Values exposed to client code.
    pub public: PublicRuntimeConfig,

    /// Integration options (redirects, wait timeout, mount point).
    pub module: ModuleOptions,
}

/// Runtime values that may be serialized into the client payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicRuntimeConfig {
    /// Canonical site URL (e.g. `"https://myapp.com"`). Empty means
    /// "use the page origin".
    pub site_url: Option<String>,
}

/// Options of the integration itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleOptions {
    /// Path prefix the auth handler is mounted under.
    ///
    /// Defaults to `"/api/auth"`.
    pub base_path: String,

    /// Where guarded pages send visitors.
    pub redirects: Redirects,

    /// Upper bound for `wait_for_session`.
    ///
    /// Defaults to 5 seconds.
    pub session_wait_timeout: Duration,
}

/// Redirect targets for page guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redirects {
    /// Where unauthenticated visitors of protected pages go.
    pub login: String,
    /// Where signed-in visitors of guest-only pages go.
    pub guest: String,
}

impl Default for Redirects {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            guest: "/".to_string(),
        }
    }
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            redirects: Redirects::default(),
            session_wait_timeout: DEFAULT_SESSION_WAIT,
        }
    }
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("secret", &"[redacted]")
            .field("public", &self.public)
            .field("module", &self.module)
            .finish()
    }
}

impl RuntimeConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            public: PublicRuntimeConfig::default(),
            module: ModuleOptions::default(),
        }
    }

    /// Load the configuration from environment variables.
    ///
    /// | Variable               | Field                          |
    /// |------------------------|--------------------------------|
    /// | `BETTER_AUTH_SECRET`   | `secret` (required)            |
    /// | `SITE_URL`             | `public.site_url`              |
    /// | `AUTH_REDIRECT_LOGIN`  | `module.redirects.login`       |
    /// | `AUTH_REDIRECT_GUEST`  | `module.redirects.guest`       |
    /// | `AUTH_SESSION_WAIT_MS` | `module.session_wait_timeout`  |
    pub fn from_env() -> AuthResult<Self> {
        let secret = std::env::var("BETTER_AUTH_SECRET")
            .map_err(|_| AuthError::config("BETTER_AUTH_SECRET is not set"))?;

        let mut config = Self::new(secret);

        if let Ok(site_url) = std::env::var("SITE_URL") {
            config = config.site_url(site_url);
        }
        if let Ok(login) = std::env::var("AUTH_REDIRECT_LOGIN") {
            config.module.redirects.login = login;
        }
        if let Ok(guest) = std::env::var("AUTH_REDIRECT_GUEST") {
            config.module.redirects.guest = guest;
        }
        if let Ok(wait) = std::env::var("AUTH_SESSION_WAIT_MS") {
            let millis = wait.parse::<u64>().map_err(|e| {
                AuthError::config(format!("AUTH_SESSION_WAIT_MS is not a number: {}", e))
            })?;
            config.module.session_wait_timeout = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the public site URL.
    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.public.site_url = if url.is_empty() { None } else { Some(url) };
        self
    }

    /// Set the path prefix of the auth routes.
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.module.base_path = path.into();
        self
    }

    /// Set the page redirect targets.
    pub fn redirects(mut self, login: impl Into<String>, guest: impl Into<String>) -> Self {
        self.module.redirects = Redirects {
            login: login.into(),
            guest: guest.into(),
        };
        self
    }

    /// Set the upper bound for `wait_for_session`.
    pub fn session_wait_timeout(mut self, timeout: Duration) -> Self {
        self.module.session_wait_timeout = timeout;
        self
    }

    pub fn validate(&self) -> AuthResult<()> {
        if self.secret.is_empty() {
            return Err(AuthError::config("Secret key cannot be empty"));
        }

        if self.secret.len() < 32 {
            return Err(AuthError::config(
                "Secret key must be at least 32 characters",
            ));
        }

        if let Some(site_url) = &self.public.site_url {
            url::Url::parse(site_url)
                .map_err(|e| AuthError::config(format!("Invalid site URL {site_url}: {e}")))?;
        }

        if !self.module.base_path.starts_with('/') {
            return Err(AuthError::config("Auth base path must start with '/'"));
        }

        Ok(())
    }
}

impl PublicRuntimeConfig {
    /// Base URL for the interactive auth client: the configured site URL,
    /// or the page origin when none is configured.
    pub fn resolve_base_url(&self, origin: &str) -> String {
        match self.site_url.as_deref() {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => origin.trim_end_matches('/').to_string(),
        }
    }
}
