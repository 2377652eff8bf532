use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse-grained permission tags gating feature visibility. Roles are kept
/// as plain strings so new ones can be added server-side without a client
/// release; these are the ones the dashboard knows about.
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const DOCTOR: &str = "doctor";
    pub const STAFF: &str = "staff";

    /// Role assumed whenever resolution fails or no record exists.
    pub const DEFAULT: &str = STAFF;
}

/// The resolved signed-in principal. Owned exclusively by the session store:
/// built on successful validation, replaced wholesale on every
/// re-validation, cleared on sign-out. Never partially mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

/// A user record as the auth backend reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub app_metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// The backend session held client-side between validations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub user: SessionUser,
}

/// Body of `/auth/v1/token` responses (password and refresh grants).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrantResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: SessionUser,
}

impl TokenGrantResponse {
    pub fn into_session(self) -> AuthSession {
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            user: self.user,
        }
    }
}

/// Push-based auth notifications, the complement to pull-based validation.
#[derive(Debug, Clone)]
pub enum AuthChangeEvent {
    SignedIn(AuthSession),
    SignedOut,
    TokenRefreshed(AuthSession),
    PasswordRecovery,
}

/// Response body of the fetch-role function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleLookupResponse {
    pub role: String,
}
