//! # Better Auth Bridge
//!
//! Glue between a web application and a wrapped auth library: per-request
//! auth instances, the auth route proxy, route protection, and a reactive
//! session shared between server rendering and the interactive client.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use better_auth_bridge::{
//!     AxumIntegration, DatabaseProvider, RouteAuth, RouteGuard, RouteRules, RuntimeConfig,
//!     ServerAuth, UserAuthOptions, route_guard,
//! };
//!
//! let auth = Arc::new(
//!     ServerAuth::builder(RuntimeConfig::from_env()?)
//!         .database(pool, DatabaseProvider::Sqlite)
//!         .configure(|_ctx| UserAuthOptions::new().email_and_password(true))
//!         .build(my_auth_library::create)?,
//! );
//!
//! let rules = RouteRules::new()
//!     .rule("/dashboard/**", RouteAuth::User)
//!     .rule("/login", RouteAuth::Guest);
//!
//! let app = axum::Router::new()
//!     .merge(auth.clone().axum_router())
//!     .layer(axum::middleware::from_fn_with_state(
//!         RouteGuard::new(auth.clone(), rules),
//!         route_guard::<Pool>,
//!     ))
//!     .with_state(auth);
//! ```

pub mod app;
#[cfg(feature = "client")]
pub mod client;
pub mod handlers;
pub mod server;

// Re-export the core crate
pub use better_auth_bridge_core as core;
pub use better_auth_bridge_core::{
    AccessDecision, AuthClient, AuthError, AuthFactory, AuthInstance, AuthOptions, AuthRequest,
    AuthResponse, AuthResult, AuthSession, AuthUser, ClientResponse, ConsoleDelivery,
    DatabaseBinding, DatabaseProvider, Expected, GetSessionOptions, HttpMethod, MemoryStorage,
    ModuleOptions, OtpPurpose, PluginSpec, PublicRuntimeConfig, Redirects, RouteAuth, RouteKind,
    RouteRule, RouteRules, RuntimeConfig, SecondaryStorage, SendResetPassword,
    SendVerificationOtp, ServerAuthContext, SessionData, SignInEmail, SignInSocial, SignUpEmail,
    UpstreamSession, UserAuthOptions, UserFields, UserMatch, evaluate, matches_user,
};

pub use app::{
    AuthCallOptions, ClientInit, ExecutionContext, FetchOptions, HydrationPayload,
    SessionSnapshot, SessionState, UserSession, init_client_session, init_server_session,
    on_mounted,
};
pub use server::{
    RequestAuth, ServerAuth, ServerAuthBuilder, get_user_session, render_session_state,
    require_user_session,
};

#[cfg(feature = "client")]
pub use client::HttpAuthClient;

#[cfg(feature = "axum")]
pub use handlers::axum::{
    AxumIntegration, CurrentUserSession, OptionalUserSession, RouteGuard, SsrSession,
    route_guard,
};
