//! User profile, account requests and role derivation.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Access level derived from the authenticated profile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular account.
    User,
    /// May reach administrative screens.
    Admin,
}

impl Role {
    /// Return the canonical string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }

    /// Derive the role for an optional profile under `policy`.
    #[must_use]
    pub fn derive(user: Option<&User>, policy: RolePolicy) -> Option<Self> {
        let user = user?;
        match policy {
            RolePolicy::Legacy => Some(Self::Admin),
            RolePolicy::StrictStaff if user.is_staff || user.role.as_deref() == Some("admin") => {
                Some(Self::Admin)
            }
            RolePolicy::StrictStaff => Some(Self::User),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err("unknown role"),
        }
    }
}

/// How [`Role`] is derived from a profile.
///
/// `Legacy` treats every authenticated user as an admin, matching the
/// behaviour deployed screens were built against. `StrictStaff` only grants
/// admin to staff accounts or profiles whose `role` is `"admin"`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RolePolicy {
    /// Any authenticated user is an admin.
    #[default]
    Legacy,
    /// Admin only for staff or an explicit `admin` role.
    StrictStaff,
}

impl RolePolicy {
    /// Return the canonical string representation used in configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::StrictStaff => "strict_staff",
        }
    }
}

impl fmt::Display for RolePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RolePolicy {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "strict_staff" | "strict-staff" | "strict" => Ok(Self::StrictStaff),
            _ => Err("unknown role policy"),
        }
    }
}

/// Authenticated profile returned by `/auth/users/me/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Backend identifier.
    pub id: i64,

    /// Login email.
    pub email: String,

    /// Given name.
    #[serde(default)]
    pub first_name: String,

    /// Family name.
    #[serde(default)]
    pub last_name: String,

    /// Optional contact number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    /// Public URL of the uploaded avatar.
    #[serde(
        default,
        rename = "avatar",
        alias = "avatar_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<String>,

    /// Backend staff flag.
    #[serde(default)]
    pub is_staff: bool,

    /// Free-form role string, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl User {
    /// Display name assembled from first and last name, falling back to the email.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Partial profile for `PATCH /auth/users/me/`. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New given name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// New family name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// New login email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New contact number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl ProfileUpdate {
    /// True when no field would be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
    }
}

/// Body for `POST /auth/users/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Login email.
    pub email: String,
    /// Optional contact number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    /// Chosen password.
    pub password: String,
    /// Confirmation of `password`.
    pub re_password: String,
}
