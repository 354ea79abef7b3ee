pub mod auth;
pub mod health;
pub mod oauth;
pub mod user;

use axum::extract::{FromRequest, Request, rejection::JsonRejection};
use axum::http::{HeaderMap, header};
use credential_api::SessionMetadata;

use crate::error::AppError;

/// `axum::Json` dont le rejet passe par [`AppError`], pour un corps
/// d'erreur uniforme.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// User-Agent et premier saut de X-Forwarded-For.
pub fn session_metadata(headers: &HeaderMap) -> SessionMetadata {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let client_ip = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string);

    SessionMetadata {
        user_agent,
        client_ip,
    }
}

/// Rejette un champ obligatoire vide avant d'appeler le service.
pub fn require<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{field} is required")));
    }
    Ok(trimmed)
}
