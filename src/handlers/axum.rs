use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRequestParts, Request, State},
    http::{StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::any,
};
use tracing::debug;

use better_auth_bridge_core::{
    AccessDecision, AuthError, AuthRequest, AuthResponse, HttpMethod, RouteAuth, RouteKind,
    RouteRules, SessionData, evaluate,
};

use crate::app::UserSession;
use crate::server::{
    RequestAuth, ServerAuth, get_user_session, headers_to_map, render_session_state,
    require_user_session,
};

/// Integration trait for Axum web framework
pub trait AxumIntegration<DB> {
    /// Router forwarding everything under the auth base path to the
    /// request's auth instance.
    fn axum_router(self) -> Router<Arc<ServerAuth<DB>>>;
}

impl<DB> AxumIntegration<DB> for Arc<ServerAuth<DB>>
where
    DB: Send + Sync + 'static,
{
    fn axum_router(self) -> Router<Arc<ServerAuth<DB>>> {
        let path = format!("{}/{{*path}}", self.base_path());
        Router::new()
            .route(&path, any(proxy_auth_request::<DB>))
            .with_state(self)
    }
}

async fn proxy_auth_request<DB>(State(auth): State<Arc<ServerAuth<DB>>>, req: Request) -> Response
where
    DB: Send + Sync + 'static,
{
    let (mut parts, body) = req.into_parts();
    let instance = match auth.for_request(&mut parts.extensions) {
        Ok(instance) => instance,
        Err(err) => return IntoResponse::into_response(err),
    };

    match convert_axum_request(Request::from_parts(parts, body)).await {
        Ok(auth_req) => convert_auth_response(instance.handler(auth_req).await),
        Err(err) => IntoResponse::into_response(err),
    }
}

async fn convert_axum_request(req: Request) -> Result<AuthRequest, AuthError> {
    let (parts, body) = req.into_parts();

    let method = match parts.method {
        axum::http::Method::GET => HttpMethod::Get,
        axum::http::Method::POST => HttpMethod::Post,
        axum::http::Method::PUT => HttpMethod::Put,
        axum::http::Method::DELETE => HttpMethod::Delete,
        axum::http::Method::PATCH => HttpMethod::Patch,
        axum::http::Method::OPTIONS => HttpMethod::Options,
        axum::http::Method::HEAD => HttpMethod::Head,
        _ => return Err(AuthError::bad_request("Unsupported HTTP method")),
    };

    let headers = headers_to_map(&parts.headers);
    let path = parts.uri.path().to_string();

    let mut query = HashMap::new();
    if let Some(query_str) = parts.uri.query() {
        for (key, value) in url::form_urlencoded::parse(query_str.as_bytes()) {
            query.insert(key.to_string(), value.to_string());
        }
    }

    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| AuthError::bad_request(format!("Failed to read body: {}", e)))?;
    let body = if body_bytes.is_empty() {
        None
    } else {
        Some(body_bytes.to_vec())
    };

    Ok(AuthRequest::from_parts(method, path, headers, body, query))
}

fn convert_auth_response(auth_response: AuthResponse) -> Response {
    let mut response = Response::builder().status(
        StatusCode::from_u16(auth_response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    );

    for (name, value) in auth_response.headers {
        if let (Ok(header_name), Ok(header_value)) = (
            axum::http::HeaderName::from_bytes(name.as_bytes()),
            axum::http::HeaderValue::from_str(&value),
        ) {
            response = response.header(header_name, header_value);
        }
    }

    response
        .body(axum::body::Body::from(auth_response.body))
        .unwrap_or_else(|_| IntoResponse::into_response(AuthError::internal("invalid auth response")))
}

/// Signed-in session of the current request. Rejects with 401.
pub struct CurrentUserSession(pub SessionData);

/// Session of the current request, if any.
pub struct OptionalUserSession(pub Option<SessionData>);

/// Session state for rendering the current request, without the session
/// token. Shares the request's session lookup with the guard and the other
/// extractors.
pub struct SsrSession(pub UserSession);

impl<DB> FromRequestParts<Arc<ServerAuth<DB>>> for CurrentUserSession
where
    DB: Send + Sync + 'static,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerAuth<DB>>,
    ) -> Result<Self, Self::Rejection> {
        require_user_session(state, parts, None)
            .await
            .map(CurrentUserSession)
    }
}

impl<DB> FromRequestParts<Arc<ServerAuth<DB>>> for OptionalUserSession
where
    DB: Send + Sync + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerAuth<DB>>,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalUserSession(get_user_session(state, parts).await))
    }
}

impl<DB> FromRequestParts<Arc<ServerAuth<DB>>> for RequestAuth
where
    DB: Send + Sync + 'static,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerAuth<DB>>,
    ) -> Result<Self, Self::Rejection> {
        state.for_request(&mut parts.extensions).map(RequestAuth)
    }
}

impl<DB> FromRequestParts<Arc<ServerAuth<DB>>> for SsrSession
where
    DB: Send + Sync + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<ServerAuth<DB>>,
    ) -> Result<Self, Self::Rejection> {
        let session_state = render_session_state(state, parts).await;

        Ok(SsrSession(UserSession::server(
            session_state,
            &state.runtime_config().module,
        )))
    }
}

/// State of the [`route_guard`] middleware.
pub struct RouteGuard<DB> {
    auth: Arc<ServerAuth<DB>>,
    rules: Arc<RouteRules>,
}

impl<DB> Clone for RouteGuard<DB> {
    fn clone(&self) -> Self {
        Self {
            auth: self.auth.clone(),
            rules: self.rules.clone(),
        }
    }
}

impl<DB> RouteGuard<DB>
where
    DB: Send + Sync + 'static,
{
    /// Guard `rules`, keeping the auth routes of `auth` public.
    pub fn new(auth: Arc<ServerAuth<DB>>, rules: RouteRules) -> Self {
        let rules = rules.auth_base_path(auth.base_path());
        Self {
            auth,
            rules: Arc::new(rules),
        }
    }

    pub fn rules(&self) -> &RouteRules {
        &self.rules
    }
}

/// Middleware applying route rules to every request.
///
/// Pages are redirected with `302 Found`; APIs are answered with a JSON
/// `401` or `403`.
///
/// ```rust,ignore
/// let guard = RouteGuard::new(auth.clone(), rules);
/// let app = Router::new()
///     .route("/dashboard", get(dashboard))
///     .layer(axum::middleware::from_fn_with_state(guard, route_guard::<Db>));
/// ```
pub async fn route_guard<DB>(
    State(guard): State<RouteGuard<DB>>,
    req: Request,
    next: Next,
) -> Response
where
    DB: Send + Sync + 'static,
{
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let rule = guard.rules.resolve(&target).clone();
    if rule == RouteAuth::Public {
        return next.run(req).await;
    }

    let (mut parts, body) = req.into_parts();
    let session = get_user_session(&guard.auth, &mut parts).await;

    let decision = evaluate(
        &rule,
        session.as_ref().map(|s| &s.user),
        &target,
        RouteKind::for_path(parts.uri.path()),
        guard.auth.redirects(),
    );

    match decision {
        AccessDecision::Allow => next.run(Request::from_parts(parts, body)).await,
        AccessDecision::Redirect(location) => {
            debug!(path = %target, location = %location, "Redirecting guarded page");
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        AccessDecision::Deny(401) => IntoResponse::into_response(AuthError::Unauthenticated),
        AccessDecision::Deny(_) => IntoResponse::into_response(AuthError::forbidden("Access denied")),
    }
}
