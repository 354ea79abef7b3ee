use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use crate::auth::context::RequestContext;
use crate::auth::jwt::TokenManager;
use crate::auth::services::CredentialService;

/// État partagé par tous les handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CredentialService>,
    pub tokens: Arc<TokenManager>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        service: Arc<CredentialService>,
        tokens: Arc<TokenManager>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            service,
            tokens,
            request_timeout,
        }
    }
}

impl FromRef<AppState> for Arc<TokenManager> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

/// Chaque requête reçoit sa propre échéance. Une déconnexion du client
/// abandonne le future du handler, et l'opération avec.
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::with_timeout(state.request_timeout))
    }
}
