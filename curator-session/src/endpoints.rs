//! Typed wrappers for the backend's authentication endpoints.

use crate::api::ApiClient;
use crate::error::{SessionError, SessionResult};
use reqwest::multipart::{Form, Part};
use shared::models::{
    CredentialPair, LoginRequest, PasswordResetRequest, ProfileUpdate, RefreshRequest,
    RefreshResponse, RegisterRequest, SetPasswordRequest, TokenPairResponse, User,
};
use std::{fs, io, path::Path};

/// Endpoint paths relative to the API base.
pub mod paths {
    /// Credential exchange.
    pub const JWT_CREATE: &str = "auth/jwt/create";
    /// Access token refresh.
    pub const JWT_REFRESH: &str = "auth/jwt/refresh";
    /// Account registration.
    pub const USERS: &str = "auth/users/";
    /// Signed-in profile.
    pub const ME: &str = "auth/users/me/";
    /// Avatar upload.
    pub const AVATAR: &str = "auth/users/avatar/";
    /// Password change.
    pub const SET_PASSWORD: &str = "auth/users/set_password/";
    /// Password reset request.
    pub const RESET_PASSWORD: &str = "auth/users/reset_password/";
}

/// Form field the avatar file is sent under.
pub const AVATAR_FIELD: &str = "avatar";

/// Image file to upload as the account avatar.
#[derive(Clone, PartialEq, Eq)]
pub struct AvatarUpload {
    /// File name sent with the part.
    pub file_name: String,
    /// MIME type; `None` lets the server sniff it.
    pub content_type: Option<String>,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for AvatarUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvatarUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl AvatarUpload {
    /// Read an image from disk, guessing the content type from its extension.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the file cannot be read.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("avatar")
            .to_string();
        let content_type = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(guess_image_type)
            .map(str::to_string);
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    fn part(&self) -> Part {
        let part = Part::bytes(self.bytes.clone()).file_name(self.file_name.clone());
        match &self.content_type {
            Some(content_type) => part
                .mime_str(content_type)
                .unwrap_or_else(|_| Part::bytes(self.bytes.clone()).file_name(self.file_name.clone())),
            None => part,
        }
    }

    fn form(&self) -> Form {
        Form::new().part(AVATAR_FIELD, self.part())
    }
}

fn guess_image_type(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

impl ApiClient {
    /// Exchange credentials for a fresh token pair. Sent without a bearer token.
    ///
    /// # Errors
    /// Bad credentials surface as [`SessionError::Validation`] with the
    /// backend's message.
    pub async fn create_tokens(&self, email: &str, password: &str) -> SessionResult<CredentialPair> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: TokenPairResponse = self.post_anonymous(paths::JWT_CREATE, &request).await?;
        Ok(response.into())
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn refresh_tokens(&self, refresh_token: &str) -> SessionResult<RefreshResponse> {
        let request = RefreshRequest {
            refresh: refresh_token.to_string(),
        };
        self.post_anonymous(paths::JWT_REFRESH, &request).await
    }

    /// Create an account.
    ///
    /// # Errors
    /// Field errors surface as [`SessionError::Validation`].
    pub async fn register(&self, request: &RegisterRequest) -> SessionResult<User> {
        self.post_anonymous(paths::USERS, request).await
    }

    /// Fetch the authenticated profile.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn current_user(&self) -> SessionResult<User> {
        self.get(paths::ME).await
    }

    /// Apply a partial profile update.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidRequest`] for an empty update.
    pub async fn update_current_user(&self, update: &ProfileUpdate) -> SessionResult<User> {
        if update.is_empty() {
            return Err(SessionError::InvalidRequest(
                "profile update has no fields".to_string(),
            ));
        }
        self.patch(paths::ME, update).await
    }

    /// Upload a new avatar as multipart form data.
    ///
    /// # Errors
    /// Returns [`SessionError::InvalidRequest`] for an empty file or an
    /// unparseable content type.
    pub async fn upload_avatar(&self, upload: &AvatarUpload) -> SessionResult<User> {
        if upload.bytes.is_empty() {
            return Err(SessionError::InvalidRequest("avatar file is empty".to_string()));
        }
        if let Some(content_type) = &upload.content_type {
            Part::bytes(Vec::new())
                .mime_str(content_type)
                .map_err(|err| SessionError::InvalidRequest(err.to_string()))?;
        }
        self.patch_multipart(paths::AVATAR, || upload.form()).await
    }

    /// Change the password of the authenticated account.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn set_password(&self, request: &SetPasswordRequest) -> SessionResult<()> {
        self.post_no_content(paths::SET_PASSWORD, request).await
    }

    /// Ask the backend to email a password reset link.
    ///
    /// # Errors
    /// See [`SessionError`].
    pub async fn request_password_reset(&self, email: &str) -> SessionResult<()> {
        let request = PasswordResetRequest {
            email: email.to_string(),
        };
        self.post_anonymous_no_content(paths::RESET_PASSWORD, &request)
            .await
    }
}
