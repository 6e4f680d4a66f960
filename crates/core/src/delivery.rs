//! Delivery hooks the auth library calls to send one-time codes and
//! password-reset links.
//!
//! Applications implement these against their mail or SMS provider and hand
//! them over through [`UserAuthOptions`](crate::options::UserAuthOptions).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthResult;
use crate::types::AuthUser;

/// Why a one-time password is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OtpPurpose {
    SignIn,
    EmailVerification,
    ForgetPassword,
}

/// Callback for delivering password-reset links.
#[async_trait]
pub trait SendResetPassword: Send + Sync {
    /// * `user` - The user who requested the reset
    /// * `url` - The full reset URL including the token
    /// * `token` - The raw reset token
    async fn send(&self, user: &AuthUser, url: &str, token: &str) -> AuthResult<()>;
}

/// Callback for delivering one-time passwords.
#[async_trait]
pub trait SendVerificationOtp: Send + Sync {
    async fn send(&self, email: &str, otp: &str, purpose: OtpPurpose) -> AuthResult<()>;
}

/// Development delivery that logs instead of sending.
///
/// Useful for local development and testing. Never use it in production:
/// it writes reset links and codes to the log.
#[derive(Debug, Clone, Default)]
pub struct ConsoleDelivery;

#[async_trait]
impl SendResetPassword for ConsoleDelivery {
    async fn send(&self, user: &AuthUser, url: &str, _token: &str) -> AuthResult<()> {
        tracing::info!(
            user_id = %user.id,
            email = user.email().unwrap_or_default(),
            url,
            "Password reset requested"
        );
        Ok(())
    }
}

#[async_trait]
impl SendVerificationOtp for ConsoleDelivery {
    async fn send(&self, email: &str, otp: &str, purpose: OtpPurpose) -> AuthResult<()> {
        tracing::info!(email, otp, ?purpose, "One-time password issued");
        Ok(())
    }
}
