//! Wire models exchanged with the Curator backend.

pub mod auth;
pub mod user;

pub use auth::{
    CredentialPair, LoginRequest, PasswordResetRequest, RefreshRequest, RefreshResponse,
    SetPasswordRequest, TokenPairResponse,
};
pub use user::{ProfileUpdate, RegisterRequest, Role, RolePolicy, User};
