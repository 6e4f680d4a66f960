//! Session initialisation on both sides of a page load.
//!
//! The server resolves the session while rendering and ships the snapshot
//! in a [`HydrationPayload`]; the client then decides whether to trust that
//! snapshot or fetch again.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use better_auth_bridge_core::{AuthInstance, AuthRequest, HttpMethod, decode_session_response};

use super::composable::{FetchOptions, UserSession};
use super::state::{SessionSnapshot, SessionState};

/// Resolve the session of the request being rendered into `state`.
///
/// Only the `cookie` header is forwarded. The session token never reaches
/// `state`. Failures are logged and leave the user logged out; the state is
/// ready afterwards in every case.
pub async fn init_server_session(
    state: &SessionState,
    auth: &dyn AuthInstance,
    headers: &HashMap<String, String>,
) {
    let mut request = AuthRequest::new(
        HttpMethod::Get,
        format!("{}/get-session", auth.base_path()),
    );
    if let Some(cookie) = headers.get("cookie") {
        request = request.with_header("cookie", cookie.clone());
    }

    let response = auth.handler(request).await;
    match decode_session_response(&response) {
        Ok(data) => {
            debug!(logged_in = data.is_some(), "Server session resolved");
            state.resolve(data);
        }
        Err(err) => {
            warn!(error = %err, "Failed to resolve server session");
            state.resolve(None);
        }
    }
}

/// What the server hands to the client alongside the rendered page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationPayload {
    /// The page was rendered for this request.
    pub server_rendered: bool,
    /// Set when the page was rendered at build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerendered_at: Option<DateTime<Utc>>,
    /// The page came out of a render cache.
    #[serde(default)]
    pub is_cached: bool,
    pub state: SessionSnapshot,
}

impl HydrationPayload {
    /// Payload of a page rendered for the current request.
    pub fn rendered(state: &SessionState) -> Self {
        Self {
            server_rendered: true,
            prerendered_at: None,
            is_cached: false,
            state: state.snapshot(),
        }
    }

    /// Payload of a page rendered ahead of time, without any visitor.
    pub fn prerendered(state: &SessionState, at: DateTime<Utc>) -> Self {
        Self {
            prerendered_at: Some(at),
            ..Self::rendered(state)
        }
    }
}

/// How the client obtained its first session value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientInit {
    /// No server render: the session was fetched right away.
    FetchedNow,
    /// Prerendered or cached page: fetch once the app is mounted.
    DeferredUntilMounted,
    /// The server snapshot belongs to this visitor and was taken as is.
    Hydrated,
}

/// Initialise the client session from the server payload.
pub async fn init_client_session(payload: HydrationPayload, session: &UserSession) -> ClientInit {
    if !payload.server_rendered {
        session.fetch_session(FetchOptions::default()).await;
        return ClientInit::FetchedNow;
    }

    let deferred = payload.prerendered_at.is_some() || payload.is_cached;
    session.state().hydrate(payload.state);

    if deferred {
        ClientInit::DeferredUntilMounted
    } else {
        ClientInit::Hydrated
    }
}

/// Run the fetch deferred by [`init_client_session`], if any.
pub async fn on_mounted(init: ClientInit, session: &UserSession) {
    if init == ClientInit::DeferredUntilMounted {
        session.fetch_session(FetchOptions::default()).await;
    }
}
