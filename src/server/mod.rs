//! Server-side construction of auth library instances.

pub mod session;

use std::sync::Arc;

use http::Extensions;
use tracing::debug;

use better_auth_bridge_core::{
    AuthError, AuthFactory, AuthInstance, AuthOptions, AuthResult, DatabaseBinding,
    DatabaseProvider, Redirects, RuntimeConfig, SecondaryStorage, ServerAuthContext,
    UserAuthOptions,
};

pub use session::{
    RequestAuth, get_user_session, headers_to_map, render_session_state, require_user_session,
};

/// User configuration function: receives the runtime config and database
/// handle, returns the options the application wants.
pub type ConfigureFn<DB> =
    dyn for<'a> Fn(ServerAuthContext<'a, DB>) -> UserAuthOptions + Send + Sync;

/// Builds auth library instances from runtime config, user options and the
/// infrastructure the application owns.
///
/// Instances are never cached for the process lifetime; use
/// [`ServerAuth::for_request`] to get the one instance belonging to a request.
pub struct ServerAuth<DB> {
    runtime_config: Arc<RuntimeConfig>,
    database: Option<DatabaseBinding<DB>>,
    secondary_storage: Option<Arc<dyn SecondaryStorage>>,
    configure: Arc<ConfigureFn<DB>>,
    factory: Arc<dyn AuthFactory<DB>>,
}

/// Builder for [`ServerAuth`].
pub struct ServerAuthBuilder<DB> {
    runtime_config: RuntimeConfig,
    database: Option<DatabaseBinding<DB>>,
    secondary_storage: Option<Arc<dyn SecondaryStorage>>,
    configure: Option<Arc<ConfigureFn<DB>>>,
}

impl<DB> ServerAuthBuilder<DB>
where
    DB: Send + Sync + 'static,
{
    pub fn new(runtime_config: RuntimeConfig) -> Self {
        Self {
            runtime_config,
            database: None,
            secondary_storage: None,
            configure: None,
        }
    }

    /// Attach the database handle. Without one the library runs in
    /// database-less mode.
    pub fn database(mut self, handle: DB, provider: DatabaseProvider) -> Self {
        self.database = Some(DatabaseBinding {
            handle: Arc::new(handle),
            provider,
        });
        self
    }

    /// Attach an already shared database handle.
    pub fn shared_database(mut self, handle: Arc<DB>, provider: DatabaseProvider) -> Self {
        self.database = Some(DatabaseBinding { handle, provider });
        self
    }

    pub fn secondary_storage<S: SecondaryStorage + 'static>(mut self, storage: S) -> Self {
        self.secondary_storage = Some(Arc::new(storage));
        self
    }

    /// Set the user configuration function.
    pub fn configure<F>(mut self, configure: F) -> Self
    where
        F: for<'a> Fn(ServerAuthContext<'a, DB>) -> UserAuthOptions + Send + Sync + 'static,
    {
        self.configure = Some(Arc::new(configure));
        self
    }

    /// Validate the runtime config and finish with the library constructor.
    pub fn build<F>(self, factory: F) -> AuthResult<ServerAuth<DB>>
    where
        F: AuthFactory<DB> + 'static,
    {
        self.runtime_config.validate()?;

        let configure: Arc<ConfigureFn<DB>> = match self.configure {
            Some(configure) => configure,
            None => Arc::new(|_: ServerAuthContext<'_, DB>| UserAuthOptions::new()),
        };

        Ok(ServerAuth {
            runtime_config: Arc::new(self.runtime_config),
            database: self.database,
            secondary_storage: self.secondary_storage,
            configure,
            factory: Arc::new(factory),
        })
    }
}

impl<DB> ServerAuth<DB>
where
    DB: Send + Sync + 'static,
{
    pub fn builder(runtime_config: RuntimeConfig) -> ServerAuthBuilder<DB> {
        ServerAuthBuilder::new(runtime_config)
    }

    pub fn runtime_config(&self) -> &RuntimeConfig {
        &self.runtime_config
    }

    pub fn redirects(&self) -> &Redirects {
        &self.runtime_config.module.redirects
    }

    pub fn base_path(&self) -> &str {
        &self.runtime_config.module.base_path
    }

    /// Run the user configuration and merge in the infrastructure options.
    ///
    /// Secret, base URL, base path, database and secondary storage always
    /// come from the bridge.
    pub fn options(&self) -> AuthOptions<DB> {
        let context = ServerAuthContext {
            runtime_config: &self.runtime_config,
            db: self.database.as_ref().map(|binding| &binding.handle),
        };
        let user = (self.configure)(context);

        AuthOptions {
            user,
            secret: self.runtime_config.secret.clone(),
            base_url: self.runtime_config.public.site_url.clone().unwrap_or_default(),
            base_path: self.runtime_config.module.base_path.clone(),
            database: self.database.clone(),
            secondary_storage: self.secondary_storage.clone(),
        }
    }

    /// Build a fresh instance.
    pub fn create(&self) -> AuthResult<Arc<dyn AuthInstance>> {
        let options = self.options();
        debug!(
            base_path = %options.base_path,
            database = ?options.database.as_ref().map(|d| d.provider),
            plugins = options.user.plugins.len(),
            "Creating auth instance"
        );

        let instance = self.factory.create(options)?;
        if instance.base_path() != self.base_path() {
            return Err(AuthError::config(format!(
                "Auth instance is mounted at {} but the bridge expects {}",
                instance.base_path(),
                self.base_path()
            )));
        }
        Ok(instance)
    }

    /// The instance belonging to the request owning `extensions`, created on
    /// first use and reused for the rest of that request.
    pub fn for_request(&self, extensions: &mut Extensions) -> AuthResult<Arc<dyn AuthInstance>> {
        if let Some(RequestAuth(instance)) = extensions.get::<RequestAuth>() {
            return Ok(instance.clone());
        }

        let instance = self.create()?;
        extensions.insert(RequestAuth(instance.clone()));
        Ok(instance)
    }
}
