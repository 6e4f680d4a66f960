use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

use better_auth_bridge_core::{AuthSession, AuthUser, SessionData, UpstreamSession};

/// Current session as seen by UI code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: Option<AuthSession>,
    pub user: Option<AuthUser>,
    /// Set once the first session determination has finished, whatever its
    /// outcome.
    pub ready: bool,
}

impl SessionSnapshot {
    pub fn logged_in(&self) -> bool {
        self.session.is_some() && self.user.is_some()
    }
}

/// Shared session state of one execution context (a rendered request, or
/// one interactive session).
///
/// Clones share the same underlying value.
#[derive(Clone, Debug)]
pub struct SessionState {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::from_snapshot(SessionSnapshot::default())
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let (tx, _rx) = watch::channel(snapshot);
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn logged_in(&self) -> bool {
        self.tx.borrow().logged_in()
    }

    pub fn ready(&self) -> bool {
        self.tx.borrow().ready
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    /// Store a resolved session.
    pub fn set_session(&self, data: SessionData) {
        self.tx.send_modify(|state| {
            state.session = Some(data.session);
            state.user = Some(data.user);
        });
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|state| {
            let changed = state.session.is_some() || state.user.is_some();
            state.session = None;
            state.user = None;
            changed
        });
    }

    pub fn mark_ready(&self) {
        self.tx.send_if_modified(|state| !std::mem::replace(&mut state.ready, true));
    }

    /// Store the outcome of a session determination and mark ready.
    pub fn resolve(&self, data: Option<SessionData>) {
        self.tx.send_modify(|state| {
            match data {
                Some(data) => {
                    state.session = Some(data.session);
                    state.user = Some(data.user);
                }
                None => {
                    state.session = None;
                    state.user = None;
                }
            }
            state.ready = true;
        });
    }

    /// Replace the whole snapshot (hydration from a server payload).
    pub fn hydrate(&self, snapshot: SessionSnapshot) {
        self.tx.send_replace(snapshot);
    }

    /// Shallow-merge `patch` into the current user. No-op when logged out.
    pub fn update_user(&self, patch: Map<String, Value>) {
        self.tx.send_if_modified(|state| match state.user.as_mut() {
            Some(user) => {
                user.merge(patch);
                true
            }
            None => false,
        });
    }

    /// Mirror one value of the auth client's reactive store.
    ///
    /// `Pending` leaves the state untouched; a resolved value replaces
    /// session and user and marks the state ready.
    pub fn apply_upstream(&self, upstream: &UpstreamSession) {
        match upstream {
            UpstreamSession::Pending => {}
            UpstreamSession::Empty => self.resolve(None),
            UpstreamSession::Present(data) => self.resolve(Some(data.clone())),
        }
    }
}
