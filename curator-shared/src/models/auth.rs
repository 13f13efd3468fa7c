//! Credential and password request bodies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Access/refresh token pair held by the token store.
///
/// Both tokens are opaque bearer strings. `Debug` never prints them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Short-lived bearer credential attached to authenticated requests.
    pub access_token: String,
    /// Longer-lived credential exchanged for a new access token.
    pub refresh_token: String,
}

impl CredentialPair {
    /// Build a pair from its two tokens.
    #[must_use]
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// Return a pair carrying a new access token and the same refresh token.
    #[must_use]
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Body for `POST /auth/jwt/create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

/// Response of the credential exchange endpoint.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPairResponse {
    /// New access token.
    pub access: String,
    /// New refresh token.
    pub refresh: String,
}

impl fmt::Debug for TokenPairResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenPairResponse { .. }")
    }
}

impl From<TokenPairResponse> for CredentialPair {
    fn from(value: TokenPairResponse) -> Self {
        Self {
            access_token: value.access,
            refresh_token: value.refresh,
        }
    }
}

/// Body for `POST /auth/jwt/refresh`.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Refresh token to exchange.
    pub refresh: String,
}

impl fmt::Debug for RefreshRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshRequest { .. }")
    }
}

/// Response of the refresh endpoint. The refresh token is not rotated.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshResponse {
    /// Replacement access token.
    pub access: String,
}

impl fmt::Debug for RefreshResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RefreshResponse { .. }")
    }
}

/// Body for `POST /auth/users/set_password/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetPasswordRequest {
    /// Password currently on the account.
    pub current_password: String,
    /// Replacement password.
    pub new_password: String,
    /// Confirmation of the replacement password.
    pub re_new_password: String,
}

/// Body for `POST /auth/users/reset_password/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordResetRequest {
    /// Address the reset link is sent to.
    pub email: String,
}
