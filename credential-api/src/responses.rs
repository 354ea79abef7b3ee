use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub avatar_url: Option<String>,
    pub email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub email_verification_required: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub user: UserResponse,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RefreshTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ValidateTokenResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ValidateTokenResponse {
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            user_id: None,
            expires_at: None,
        }
    }
}

/// Generic `{success}` body shared by logout, password and reset endpoints.
#[derive(Serialize, Deserialize, Debug)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PasswordResetRequestedResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct VerifyEmailResponse {
    pub success: bool,
    pub user_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ResendVerificationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_verified: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct OAuthProvidersResponse {
    pub providers: Vec<String>,
}
