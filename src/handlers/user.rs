use axum::extract::State;

use crate::auth::context::RequestContext;
use crate::auth::extractors::AuthenticatedUser;
use crate::error::AppError;
use crate::handlers::JsonBody;
use crate::response::AppResponse;
use crate::state::AppState;
use credential_api::{ChangePasswordRequest, SuccessResponse, UserResponse};

/// GET /users/me
/// Récupère le profil de l'utilisateur courant
pub async fn get_current_user(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<AppResponse<UserResponse>, AppError> {
    let user = state.service.current_user(&ctx, &caller).await?;
    Ok(AppResponse::ok(UserResponse::from(user)))
}

/// POST /users/me/change-password
/// Change le mot de passe ; toutes les sessions sont révoquées
pub async fn change_password(
    caller: AuthenticatedUser,
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<AppResponse<SuccessResponse>, AppError> {
    if payload.current_password.is_empty() {
        return Err(AppError::validation("current_password is required"));
    }

    state
        .service
        .change_password(&ctx, &caller, &payload.current_password, &payload.new_password)
        .await?;
    Ok(AppResponse::ok(SuccessResponse { success: true }))
}
