//! # Better Auth Bridge Core
//!
//! Framework-neutral pieces of the bridge: the call contract of the wrapped
//! auth library, configuration, errors, session shapes and route rules.

pub mod config;
pub mod delivery;
pub mod error;
pub mod instance;
pub mod match_user;
pub mod options;
pub mod routes;
pub mod storage;
pub mod types;

// Re-export commonly used items
pub use config::{
    DEFAULT_BASE_PATH, DEFAULT_SESSION_WAIT, ModuleOptions, PublicRuntimeConfig, Redirects,
    RuntimeConfig,
};
pub use delivery::{ConsoleDelivery, OtpPurpose, SendResetPassword, SendVerificationOtp};
pub use error::{AuthError, AuthResult};
pub use instance::{
    AuthClient, AuthFactory, AuthInstance, ClientResponse, GetSessionOptions, SESSION_HEADERS,
    SignInEmail, SignInSocial, SignUpEmail, decode_session_response,
};
pub use match_user::{Expected, UserFields, UserMatch, matches_serialized, matches_user};
pub use options::{
    AuthOptions, DatabaseBinding, DatabaseProvider, EmailAndPasswordOptions, PluginSpec,
    ServerAuthContext, UserAuthOptions,
};
pub use routes::{AccessDecision, RouteAuth, RouteKind, RouteRule, RouteRules, evaluate, path_matches};
pub use storage::{MemoryStorage, SecondaryStorage};
pub use types::{
    AuthRequest, AuthResponse, AuthSession, AuthUser, HttpMethod, SENSITIVE_SESSION_FIELDS,
    SessionData, UpstreamSession,
};
