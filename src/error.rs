// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use credential_api::ErrorResponse;

use crate::auth::jwt::TokenError;
use crate::auth::password::{PasswordError, PasswordPolicyError};
use crate::db::error::RepositoryError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    // === Erreurs d'identité ===
    #[error("User not found")]
    UserNotFound,
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Account is inactive")]
    AccountInactive,
    #[error("Weak password: {0}")]
    WeakPassword(PasswordPolicyError),

    // === Erreurs de validation ===
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid token format")]
    InvalidTokenFormat,
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("Rate limit exceeded")]
    RateLimited,

    // === Erreurs internes ===
    #[error("Database error: {0}")]
    Database(String),
    #[error("Password hashing failed: {0}")]
    PasswordHashingFailed(String),
    #[error("Token generation failed: {0}")]
    TokenGenerationFailed(String),
    #[error("Internal server error: {0}")]
    Internal(String),

    // === Cycle de vie de la requête ===
    #[error("Request cancelled")]
    Cancelled,
    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, internal_detail) = self.get_error_info();

        if let Some(ref detail) = internal_detail {
            tracing::error!(error_code, %status, detail, "Internal server error");
        } else if self.is_client_error() {
            tracing::debug!(error_code, %status, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details: None,
        });

        (status, body).into_response()
    }
}

impl AppError {
    /// Récupère les informations d'erreur formatées pour la réponse HTTP
    fn get_error_info(&self) -> (StatusCode, &'static str, String, Option<String>) {
        match self {
            // 404 Not Found
            AppError::UserNotFound => (
                StatusCode::NOT_FOUND,
                "USER_NOT_FOUND",
                "User not found".to_string(),
                None,
            ),

            // 409 Conflict
            AppError::UserAlreadyExists => (
                StatusCode::CONFLICT,
                "USER_EXISTS",
                "User already exists".to_string(),
                None,
            ),

            // 401 Unauthorized
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid email or password".to_string(),
                None,
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                "Invalid or expired token".to_string(),
                None,
            ),
            AppError::SessionNotFound => (
                StatusCode::UNAUTHORIZED,
                "SESSION_NOT_FOUND",
                "Session not found".to_string(),
                None,
            ),

            // 403 Forbidden
            AppError::AccountInactive => (
                StatusCode::FORBIDDEN,
                "ACCOUNT_INACTIVE",
                "Account is inactive".to_string(),
                None,
            ),

            // 400 Bad Request
            AppError::WeakPassword(kind) => {
                (StatusCode::BAD_REQUEST, kind.code(), kind.to_string(), None)
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::InvalidTokenFormat => (
                StatusCode::BAD_REQUEST,
                "INVALID_TOKEN_FORMAT",
                "Token format is invalid".to_string(),
                None,
            ),
            AppError::UnsupportedProvider(provider) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_PROVIDER",
                format!("Provider '{provider}' is not supported"),
                None,
            ),

            // 429 Too Many Requests
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                "rate limit exceeded".to_string(),
                None,
            ),

            // 408
            AppError::DeadlineExceeded => (
                StatusCode::REQUEST_TIMEOUT,
                "DEADLINE_EXCEEDED",
                "The request took too long to complete".to_string(),
                None,
            ),
            AppError::Cancelled => (
                StatusCode::REQUEST_TIMEOUT,
                "REQUEST_CANCELLED",
                "The request was cancelled".to_string(),
                None,
            ),

            // 500 Internal Server Error
            AppError::PasswordHashingFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "HASHING_ERROR",
                "An error occurred while processing your request".to_string(),
                Some(msg.clone()),
            ),
            AppError::TokenGenerationFailed(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "TOKEN_ERROR",
                "An error occurred while generating token".to_string(),
                Some(msg.clone()),
            ),
            AppError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "An error occurred with the database".to_string(),
                Some(msg.clone()),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
                Some(msg.clone()),
            ),
        }
    }

    // === Constructeurs helpers ===
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        AppError::Database(msg.into())
    }

    /// Retourne le code de statut HTTP
    pub fn status_code(&self) -> StatusCode {
        self.get_error_info().0
    }

    /// Faute de l'appelant (4xx) ou du serveur (5xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

// === Conversions automatiques depuis d'autres types d'erreurs ===

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::database(err.to_string())
    }
}

impl From<PasswordPolicyError> for AppError {
    fn from(err: PasswordPolicyError) -> Self {
        AppError::WeakPassword(err)
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::PasswordHashingFailed(err.to_string())
    }
}

// Une vérification ratée n'expose jamais la cause au client.
impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::VerificationFailed(_) => AppError::InvalidToken,
            TokenError::GenerationFailed(_) | TokenError::RandomSource(_) => {
                AppError::TokenGenerationFailed(err.to_string())
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(err: axum::extract::rejection::JsonRejection) -> Self {
        AppError::validation(format!("Invalid JSON: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_not_found_displays_correct_message() {
        assert_eq!(AppError::UserNotFound.to_string(), "User not found");
    }

    #[test]
    fn invalid_credentials_maps_to_401_status() {
        assert_eq!(
            AppError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn each_policy_kind_keeps_its_own_code() {
        let (status, code, _, _) =
            AppError::WeakPassword(PasswordPolicyError::NoDigit).get_error_info();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "PASSWORD_NO_DIGIT");
    }

    #[test]
    fn repository_errors_become_server_faults() {
        let err = AppError::from(RepositoryError::UniqueViolation("users_email_key".into()));
        assert!(matches!(err, AppError::Database(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn caller_and_server_faults_are_distinguished() {
        for err in [
            AppError::UserAlreadyExists,
            AppError::InvalidToken,
            AppError::SessionNotFound,
            AppError::AccountInactive,
            AppError::validation("email is required"),
            AppError::UnsupportedProvider("github".into()),
            AppError::RateLimited,
        ] {
            assert!(err.is_client_error(), "{err:?}");
        }

        for err in [
            AppError::internal("boom"),
            AppError::database("down"),
            AppError::PasswordHashingFailed("rng".into()),
            AppError::TokenGenerationFailed("key".into()),
        ] {
            assert!(!err.is_client_error(), "{err:?}");
        }
    }

    #[test]
    fn token_verification_failure_hides_cause() {
        let tm = crate::auth::jwt::TokenManager::with_default_ttl("a", "b");
        let err = tm.validate_access_token("garbage").unwrap_err();
        assert_eq!(AppError::from(err), AppError::InvalidToken);
    }

    #[test]
    fn internal_error_response_uses_generic_message() {
        let response = AppError::internal("connection reset by peer").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn deadline_exceeded_maps_to_408() {
        let response = AppError::DeadlineExceeded.into_response();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }
}
