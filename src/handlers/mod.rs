#[cfg(feature = "axum")]
pub mod axum;

#[cfg(feature = "axum")]
pub use self::axum::{
    AxumIntegration, CurrentUserSession, OptionalUserSession, RouteGuard, SsrSession,
    route_guard,
};
