// src/handlers/auth.rs

use axum::extract::State;
use axum::http::HeaderMap;
use credential_api::{
    LoginRequest, LoginResponse, LogoutRequest, PasswordResetRequest,
    PasswordResetRequestedResponse, RefreshTokenRequest, RefreshTokenResponse, RegisterRequest,
    RegisterResponse, ResendVerificationRequest, ResendVerificationResponse,
    ResetPasswordRequest, SuccessResponse, UserResponse, ValidateTokenRequest,
    ValidateTokenResponse, VerifyEmailRequest, VerifyEmailResponse,
};

use crate::auth::context::RequestContext;
use crate::auth::services::{LoginParams, RegisterParams};
use crate::error::AppError;
use crate::handlers::{JsonBody, require, session_metadata};
use crate::response::AppResponse;
use crate::state::AppState;

const PASSWORD_RESET_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent";

/// POST /auth/register
/// Inscription d'un nouvel utilisateur
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<AppResponse<RegisterResponse>, AppError> {
    let params = RegisterParams {
        email: require(&payload.email, "email")?.to_string(),
        username: require(&payload.username, "username")?.to_string(),
        password: payload.password,
        display_name: payload.display_name,
        metadata: session_metadata(&headers),
    };

    let result = state.service.register(&ctx, params).await?;

    Ok(AppResponse::created(RegisterResponse {
        user_id: result.user.id,
        access_token: result.tokens.access_token,
        refresh_token: result.tokens.refresh_token,
        expires_at: result.tokens.expires_at,
        token_type: result.tokens.token_type.to_string(),
        email_verification_required: result.email_verification_required,
    }))
}

/// POST /auth/login
/// Connexion d'un utilisateur
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<AppResponse<LoginResponse>, AppError> {
    let params = LoginParams {
        email: require(&payload.email, "email")?.to_string(),
        password: payload.password,
        metadata: session_metadata(&headers),
    };
    if params.password.is_empty() {
        return Err(AppError::validation("password is required"));
    }

    let result = state.service.login(&ctx, params).await?;

    Ok(AppResponse::ok(LoginResponse {
        user_id: result.user.id,
        access_token: result.tokens.access_token,
        refresh_token: result.tokens.refresh_token,
        expires_at: result.tokens.expires_at,
        token_type: result.tokens.token_type.to_string(),
        user: UserResponse::from(result.user),
    }))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(payload): JsonBody<LogoutRequest>,
) -> Result<AppResponse<SuccessResponse>, AppError> {
    let refresh_token = require(&payload.refresh_token, "refresh_token")?;
    state.service.logout(&ctx, refresh_token).await?;
    Ok(AppResponse::ok(SuccessResponse { success: true }))
}

/// POST /auth/refresh
/// Rafraîchissement des tokens
pub async fn refresh_token(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<RefreshTokenRequest>,
) -> Result<AppResponse<RefreshTokenResponse>, AppError> {
    let refresh_token = require(&payload.refresh_token, "refresh_token")?;
    let tokens = state
        .service
        .refresh_tokens(&ctx, refresh_token, &session_metadata(&headers))
        .await?;

    Ok(AppResponse::ok(RefreshTokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        expires_at: tokens.expires_at,
        token_type: tokens.token_type.to_string(),
    }))
}

/// POST /auth/validate
/// Un token invalide n'est pas une erreur : `is_valid = false`.
pub async fn validate_token(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(payload): JsonBody<ValidateTokenRequest>,
) -> Result<AppResponse<ValidateTokenResponse>, AppError> {
    let access_token = require(&payload.access_token, "access_token")?;

    match state.service.validate_access_token(&ctx, access_token).await {
        Ok(claims) => Ok(AppResponse::ok(ValidateTokenResponse {
            is_valid: true,
            user_id: Some(claims.sub),
            expires_at: claims.expires_at(),
        })),
        Err(AppError::InvalidToken) => Ok(AppResponse::ok(ValidateTokenResponse::invalid())),
        Err(e) => Err(e),
    }
}

/// POST /auth/password-reset/request
pub async fn request_password_reset(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(payload): JsonBody<PasswordResetRequest>,
) -> Result<AppResponse<PasswordResetRequestedResponse>, AppError> {
    let email = require(&payload.email, "email")?;
    state.service.request_password_reset(&ctx, email).await?;

    Ok(AppResponse::ok(PasswordResetRequestedResponse {
        success: true,
        message: PASSWORD_RESET_MESSAGE.to_string(),
    }))
}

/// POST /auth/password-reset/confirm
pub async fn reset_password(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<AppResponse<SuccessResponse>, AppError> {
    let reset_token = require(&payload.reset_token, "reset_token")?;
    state
        .service
        .reset_password(&ctx, reset_token, &payload.new_password)
        .await?;
    Ok(AppResponse::ok(SuccessResponse { success: true }))
}

/// POST /auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(payload): JsonBody<VerifyEmailRequest>,
) -> Result<AppResponse<VerifyEmailResponse>, AppError> {
    let token = require(&payload.verification_token, "verification_token")?;
    let user_id = state.service.verify_email(&ctx, token).await?;
    Ok(AppResponse::ok(VerifyEmailResponse {
        success: true,
        user_id,
    }))
}

/// POST /auth/verify-email/resend
pub async fn resend_verification(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(payload): JsonBody<ResendVerificationRequest>,
) -> Result<AppResponse<ResendVerificationResponse>, AppError> {
    let email = require(&payload.email, "email")?;
    let result = state.service.resend_verification_email(&ctx, email).await?;

    Ok(AppResponse::ok(ResendVerificationResponse {
        success: true,
        already_verified: result.already_verified.then_some(true),
    }))
}
