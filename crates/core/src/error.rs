use thiserror::Error;

use crate::types::AuthResponse;

/// Errors raised by the bridge between the application and the auth library.
///
/// Each variant maps to an HTTP status code via [`AuthError::status_code`].
/// Use [`AuthError::into_response`] to produce the `{ "message": "..." }`
/// body the auth endpoints already speak.
#[derive(Error, Debug)]
pub enum AuthError {
    // --- 400 Bad Request ---
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // --- 401 Unauthorized ---
    #[error("Authentication required")]
    Unauthenticated,

    // --- 403 Forbidden ---
    #[error("{0}")]
    Forbidden(String),

    // --- forwarded from the auth endpoints ---
    #[error("Auth endpoint responded with {status}: {message}")]
    Upstream { status: u16, message: String },

    // --- 500 Internal Server Error ---
    /// An interactive-only operation was invoked from a server render context.
    #[error("{0}() can only be called on client-side")]
    ClientOnly(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Secondary storage error: {0}")]
    Storage(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::Validation(_) => 400,
            Self::Unauthenticated => 401,
            Self::Forbidden(_) => 403,
            Self::Upstream { status, .. } => *status,
            Self::ClientOnly(_)
            | Self::Config(_)
            | Self::Storage(_)
            | Self::Transport(_)
            | Self::Serialization(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Convert this error into an [`AuthResponse`] with a `{ "message": "..." }`
    /// body.
    ///
    /// Internal errors (500) use a generic message to avoid leaking details.
    pub fn into_response(self) -> AuthResponse {
        let status = self.status_code();
        let message = match status {
            500 => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        AuthResponse::json(status, &serde_json::json!({ "message": message }))
            .unwrap_or_else(|_| AuthResponse::text(status, message))
    }

    /// Whether this error means "no usable session" rather than a fault.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status_code(), 401 | 403)
    }

    // --- Constructors ---

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let message = match status.as_u16() {
            500 => "Internal server error".to_string(),
            _ => self.to_string(),
        };

        (status, axum::Json(serde_json::json!({ "message": message }))).into_response()
    }
}
