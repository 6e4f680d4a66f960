use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{AuthError, AuthResult};

/// HTTP method enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

/// Framework-neutral request handed to the auth library's handler.
///
/// Header names are stored lowercase.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub method: HttpMethod,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    pub query: HashMap<String, String>,
}

/// Framework-neutral response produced by the auth library's handler.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl AuthRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            body: None,
            query: HashMap::new(),
        }
    }

    /// Construct a request from all public parts.
    pub fn from_parts(
        method: HttpMethod,
        path: String,
        headers: HashMap<String, String>,
        body: Option<Vec<u8>>,
        query: HashMap<String, String>,
    ) -> Self {
        Self {
            method,
            path,
            headers,
            body,
            query,
        }
    }

    pub fn header(&self, name: &str) -> Option<&String> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a JSON body and the matching `content-type` header.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> AuthResult<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn body_as_json<T: DeserializeOwned>(&self) -> AuthResult<T> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| AuthError::bad_request("Request body is required"))?;
        serde_json::from_slice(body)
            .map_err(|e| AuthError::bad_request(format!("Invalid JSON: {}", e)))
    }
}

impl AuthResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn json<T: Serialize>(status: u16, data: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(data)?;
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    pub fn text(status: u16, text: impl Into<String>) -> Self {
        let body = text.into().into_bytes();
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());

        Self {
            status,
            headers,
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers.get("set-cookie").map(String::as_str)
    }

    pub fn json_body<T: DeserializeOwned>(&self) -> AuthResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Best-effort extraction of the `message` field from an error body.
    pub fn message(&self) -> String {
        serde_json::from_slice::<Value>(&self.body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| String::from_utf8_lossy(&self.body).into_owned())
    }
}

/// Session record as exposed to application code.
///
/// Only `id` and `expiresAt` are interpreted; every other field the auth
/// library returns is carried verbatim in `extra`. The raw session `token`
/// is dropped whenever a session is built or deserialized, so it never
/// reaches client-visible state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SessionRecord")]
pub struct AuthSession {
    pub id: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire shape of a session as returned by `get-session`, token included.
#[derive(Debug, Deserialize)]
struct SessionRecord {
    id: String,
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
    #[serde(rename = "userId", default)]
    user_id: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Field names that must never be copied into client-visible session state.
pub const SENSITIVE_SESSION_FIELDS: &[&str] = &["token"];

impl From<SessionRecord> for AuthSession {
    fn from(record: SessionRecord) -> Self {
        AuthSession::new(record.id, record.expires_at)
            .with_user_id_opt(record.user_id)
            .with_extra(record.extra)
    }
}

impl AuthSession {
    pub fn new(id: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            expires_at,
            user_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        self.with_user_id_opt(Some(user_id.into()))
    }

    fn with_user_id_opt(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Merge additional fields, dropping sensitive ones.
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra.extend(
            extra
                .into_iter()
                .filter(|(key, _)| !SENSITIVE_SESSION_FIELDS.contains(&key.as_str())),
        );
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// User record as exposed to application code.
///
/// `id` is the only field the bridge requires; everything else
/// (`email`, `name`, `role`, ...) is application-defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl AuthUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn email(&self) -> Option<&str> {
        self.fields.get("email").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// Look up a field by name, `id` included.
    pub fn field(&self, name: &str) -> Option<Cow<'_, Value>> {
        if name == "id" {
            return Some(Cow::Owned(Value::String(self.id.clone())));
        }
        self.fields.get(name).map(Cow::Borrowed)
    }

    /// Shallow-merge a partial user object. `id` cannot be changed.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        for (key, value) in patch {
            if key != "id" {
                self.fields.insert(key, value);
            }
        }
    }
}

/// Body of a successful `get-session` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub session: AuthSession,
    pub user: AuthUser,
}

/// Value published by the auth client's reactive session store.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UpstreamSession {
    /// The store has not resolved yet.
    #[default]
    Pending,
    /// Resolved, nobody is signed in.
    Empty,
    /// Resolved with a session.
    Present(SessionData),
}

impl UpstreamSession {
    /// Map the library's `{ data, isPending }` store shape.
    pub fn from_store(is_pending: bool, data: Option<SessionData>) -> Self {
        match (data, is_pending) {
            (Some(data), _) => Self::Present(data),
            (None, true) => Self::Pending,
            (None, false) => Self::Empty,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn data(&self) -> Option<&SessionData> {
        match self {
            Self::Present(data) => Some(data),
            _ => None,
        }
    }
}
