//! Configuration handed to the auth library.
//!
//! The application describes *what* it wants in [`UserAuthOptions`]; the
//! bridge wraps that in [`AuthOptions`] together with the infrastructure it
//! owns (secret, base URL, database, secondary storage). Infrastructure
//! fields do not exist on `UserAuthOptions`, so user configuration has no way
//! to override them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::delivery::{SendResetPassword, SendVerificationOtp};
use crate::storage::SecondaryStorage;

/// Input of the user's configuration function.
pub struct ServerAuthContext<'a, DB> {
    pub runtime_config: &'a RuntimeConfig,
    /// `None` when the application runs without a database.
    pub db: Option<&'a Arc<DB>>,
}

/// A plugin of the auth library, identified by name with opaque options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub id: String,
    #[serde(default)]
    pub options: Value,
}

impl PluginSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            options: Value::Null,
        }
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

/// Email + password sign-in settings.
#[derive(Clone, Default)]
pub struct EmailAndPasswordOptions {
    pub enabled: bool,
    pub require_email_verification: bool,
    pub min_password_length: Option<usize>,
    pub send_reset_password: Option<Arc<dyn SendResetPassword>>,
}

/// Options the application controls.
#[derive(Clone, Default)]
pub struct UserAuthOptions {
    pub app_name: Option<String>,
    pub plugins: Vec<PluginSpec>,
    pub email_and_password: EmailAndPasswordOptions,
    pub send_verification_otp: Option<Arc<dyn SendVerificationOtp>>,
    pub trusted_origins: Vec<String>,
    /// Library settings the bridge does not interpret.
    pub extra: Map<String, Value>,
}

impl UserAuthOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn plugin(mut self, plugin: PluginSpec) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Toggle email + password authentication.
    pub fn email_and_password(mut self, enabled: bool) -> Self {
        self.email_and_password.enabled = enabled;
        self
    }

    pub fn require_email_verification(mut self, required: bool) -> Self {
        self.email_and_password.require_email_verification = required;
        self
    }

    pub fn min_password_length(mut self, length: usize) -> Self {
        self.email_and_password.min_password_length = Some(length);
        self
    }

    pub fn send_reset_password<H: SendResetPassword + 'static>(mut self, hook: H) -> Self {
        self.email_and_password.send_reset_password = Some(Arc::new(hook));
        self
    }

    pub fn send_verification_otp<H: SendVerificationOtp + 'static>(mut self, hook: H) -> Self {
        self.send_verification_otp = Some(Arc::new(hook));
        self
    }

    pub fn trusted_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_origins.push(origin.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn has_plugin(&self, id: &str) -> bool {
        self.plugins.iter().any(|p| p.id == id)
    }
}

/// SQL dialect the database handle speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseProvider {
    Sqlite,
    Postgres,
    Mysql,
}

/// Database handle plus the dialect the library's adapter should use.
pub struct DatabaseBinding<DB> {
    pub handle: Arc<DB>,
    pub provider: DatabaseProvider,
}

impl<DB> Clone for DatabaseBinding<DB> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            provider: self.provider,
        }
    }
}

/// Complete configuration passed to the auth library's constructor.
pub struct AuthOptions<DB> {
    /// What the application asked for.
    pub user: UserAuthOptions,
    pub secret: String,
    pub base_url: String,
    pub base_path: String,
    /// `None` in database-less mode.
    pub database: Option<DatabaseBinding<DB>>,
    pub secondary_storage: Option<Arc<dyn SecondaryStorage>>,
}

impl<DB> Clone for AuthOptions<DB> {
    fn clone(&self) -> Self {
        Self {
            user: self.user.clone(),
            secret: self.secret.clone(),
            base_url: self.base_url.clone(),
            base_path: self.base_path.clone(),
            database: self.database.clone(),
            secondary_storage: self.secondary_storage.clone(),
        }
    }
}

impl fmt::Debug for UserAuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserAuthOptions")
            .field("app_name", &self.app_name)
            .field("plugins", &self.plugins)
            .field("email_and_password", &self.email_and_password.enabled)
            .field("trusted_origins", &self.trusted_origins)
            .finish_non_exhaustive()
    }
}

impl<DB> fmt::Debug for AuthOptions<DB> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("user", &self.user)
            .field("secret", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .field("database", &self.database.as_ref().map(|d| d.provider))
            .field("secondary_storage", &self.secondary_storage.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::ConsoleDelivery;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let options = UserAuthOptions::new()
            .app_name("Playground")
            .plugin(PluginSpec::new("admin"))
            .plugin(PluginSpec::new("two-factor").with_options(json!({ "issuer": "x" })))
            .email_and_password(true)
            .min_password_length(10)
            .send_reset_password(ConsoleDelivery)
            .send_verification_otp(ConsoleDelivery)
            .extra("session", json!({ "expiresIn": 3600 }));

        assert_eq!(options.app_name.as_deref(), Some("Playground"));
        assert!(options.has_plugin("admin"));
        assert!(!options.has_plugin("passkey"));
        assert!(options.email_and_password.enabled);
        assert_eq!(options.email_and_password.min_password_length, Some(10));
        assert!(options.email_and_password.send_reset_password.is_some());
        assert!(options.send_verification_otp.is_some());
        assert_eq!(options.extra["session"]["expiresIn"], 3600);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let options: AuthOptions<()> = AuthOptions {
            user: UserAuthOptions::new(),
            secret: "super-secret-value-that-is-long-enough".to_string(),
            base_url: "http://localhost:3000".to_string(),
            base_path: "/api/auth".to_string(),
            database: None,
            secondary_storage: None,
        };
        let rendered = format!("{:?}", options);
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_plugin_spec_wire_shape() {
        let spec: PluginSpec = serde_json::from_value(json!({ "id": "admin" })).unwrap();
        assert_eq!(spec, PluginSpec::new("admin"));
    }
}
