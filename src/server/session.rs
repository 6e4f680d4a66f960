//! Request-scoped session resolution.
//!
//! The auth instance and the resolved session are stored in the request's
//! extensions, so every guard, extractor and handler touching the same
//! request shares one instance and one `get-session` round trip.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use http::HeaderMap;
use http::request::Parts;
use tracing::{debug, warn};

use better_auth_bridge_core::{AuthError, AuthInstance, AuthResult, SessionData, UserMatch};

use super::ServerAuth;
use crate::app::{SessionState, init_server_session};

/// The auth instance belonging to one request.
#[derive(Clone)]
pub struct RequestAuth(pub Arc<dyn AuthInstance>);

impl Deref for RequestAuth {
    type Target = dyn AuthInstance;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

/// Session already resolved for this request (`None` = nobody signed in).
#[derive(Clone)]
struct ResolvedSession(Option<SessionData>);

/// Copy request headers into the map shape the auth library consumes.
///
/// Repeated headers are folded into one value: `cookie` joins with `"; "`,
/// everything else with `", "`.
pub fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    for (name, value) in headers.iter() {
        let Ok(value_str) = value.to_str() else {
            continue;
        };
        let name = name.as_str().to_ascii_lowercase();
        let separator = if name == "cookie" { "; " } else { ", " };
        map.entry(name)
            .and_modify(|existing| {
                existing.push_str(separator);
                existing.push_str(value_str);
            })
            .or_insert_with(|| value_str.to_string());
    }
    map
}

/// Resolve the session of the current request.
///
/// Failures of the auth library are logged and treated as "nobody signed
/// in". The result is cached in the request extensions.
pub async fn get_user_session<DB>(auth: &ServerAuth<DB>, parts: &mut Parts) -> Option<SessionData>
where
    DB: Send + Sync + 'static,
{
    if let Some(ResolvedSession(session)) = parts.extensions.get::<ResolvedSession>() {
        return session.clone();
    }

    let session = match auth.for_request(&mut parts.extensions) {
        Ok(instance) => match instance.get_session(&headers_to_map(&parts.headers)).await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, path = %parts.uri.path(), "Session lookup failed");
                None
            }
        },
        Err(err) => {
            warn!(error = %err, "Could not create auth instance");
            None
        }
    };

    debug!(
        path = %parts.uri.path(),
        user_id = session.as_ref().map(|s| s.user.id.as_str()),
        "Resolved request session"
    );

    parts.extensions.insert(ResolvedSession(session.clone()));
    session
}

/// Session state for rendering the current request.
///
/// A session already resolved for this request (by the route guard or an
/// extractor) is reused. Otherwise it is resolved from the `cookie` header
/// alone and cached for the rest of the request. The state is ready in
/// every case.
pub async fn render_session_state<DB>(auth: &ServerAuth<DB>, parts: &mut Parts) -> SessionState
where
    DB: Send + Sync + 'static,
{
    let state = SessionState::new();

    if let Some(ResolvedSession(session)) = parts.extensions.get::<ResolvedSession>() {
        state.resolve(session.clone());
        return state;
    }

    match auth.for_request(&mut parts.extensions) {
        Ok(instance) => {
            init_server_session(&state, instance.as_ref(), &headers_to_map(&parts.headers)).await
        }
        Err(err) => {
            warn!(error = %err, "Could not create auth instance for rendering");
            state.resolve(None);
        }
    }

    let snapshot = state.snapshot();
    let session = snapshot
        .session
        .zip(snapshot.user)
        .map(|(session, user)| SessionData { session, user });
    parts.extensions.insert(ResolvedSession(session));
    state
}

/// Resolve the session and require a signed-in user, optionally matching
/// `predicate`.
///
/// Fails with [`AuthError::Unauthenticated`] (401) without a session and
/// [`AuthError::Forbidden`] (403) when the predicate does not match.
pub async fn require_user_session<DB>(
    auth: &ServerAuth<DB>,
    parts: &mut Parts,
    predicate: Option<&UserMatch>,
) -> AuthResult<SessionData>
where
    DB: Send + Sync + 'static,
{
    let session = get_user_session(auth, parts)
        .await
        .ok_or(AuthError::Unauthenticated)?;

    if let Some(predicate) = predicate
        && !predicate.matches(&session.user)
    {
        return Err(AuthError::forbidden("Access denied"));
    }

    Ok(session)
}
