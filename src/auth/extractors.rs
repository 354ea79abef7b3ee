use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{header, request::Parts};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::auth::jwt::{Claims, TokenManager};
use crate::error::AppError;

/// Identité de l'appelant, produite par l'extracteur à partir de
/// `Authorization: Bearer <JWT>` et passée explicitement aux opérations
/// du service qui en ont besoin.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub role: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Claims> for AuthenticatedUser {
    fn from(c: Claims) -> Self {
        let expires_at = c.expires_at();
        Self {
            user_id: c.sub,
            email: c.email,
            username: c.username,
            role: c.role,
            expires_at,
        }
    }
}

const BEARER: &str = "Bearer ";

/// Extrait le token brut d'un header `Authorization`.
pub fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_str = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::InvalidTokenFormat)?
        .to_str()
        .map_err(|_| AppError::InvalidTokenFormat)?;

    auth_str
        .strip_prefix(BEARER)
        .filter(|token| !token.is_empty())
        .ok_or(AppError::InvalidTokenFormat)
}

/// Implémentation de l'extracteur pour tout state exposant un `TokenManager`.
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let tokens = Arc::<TokenManager>::from_ref(state);

        let claims = tokens
            .validate_access_token(token)
            .map_err(|_| AppError::InvalidToken)?;

        Ok(AuthenticatedUser::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header_value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/users/me");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn valid_bearer_token_yields_identity() {
        let tokens = Arc::new(TokenManager::with_default_ttl("access", "refresh"));
        let id = Uuid::new_v4();
        let pair = tokens
            .generate_token_pair(id, "jane@example.com", "jane", "user")
            .unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", pair.access_token)));

        let user = AuthenticatedUser::from_request_parts(&mut parts, &tokens)
            .await
            .unwrap();

        assert_eq!(user.user_id, id);
        assert_eq!(user.username, "jane");
        assert!(user.expires_at.is_some());
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_a_format_error() {
        let tokens = Arc::new(TokenManager::with_default_ttl("access", "refresh"));

        for header_value in [None, Some("Basic abc"), Some("Bearer ")] {
            let mut parts = parts_with(header_value);
            let err = AuthenticatedUser::from_request_parts(&mut parts, &tokens)
                .await
                .unwrap_err();
            assert_eq!(err, AppError::InvalidTokenFormat, "{header_value:?}");
        }
    }

    #[tokio::test]
    async fn refresh_token_is_not_accepted_as_bearer() {
        let tokens = Arc::new(TokenManager::with_default_ttl("access", "refresh"));
        let pair = tokens
            .generate_token_pair(Uuid::new_v4(), "jane@example.com", "jane", "user")
            .unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", pair.refresh_token)));

        let err = AuthenticatedUser::from_request_parts(&mut parts, &tokens)
            .await
            .unwrap_err();

        assert_eq!(err, AppError::InvalidToken);
    }
}
