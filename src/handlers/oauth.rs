use axum::extract::State;
use credential_api::OAuthProvidersResponse;

use crate::response::AppResponse;
use crate::state::AppState;

/// GET /auth/oauth/providers
/// Fournisseurs OAuth configurés sur cette instance
pub async fn list_providers(State(state): State<AppState>) -> AppResponse<OAuthProvidersResponse> {
    let providers = state
        .service
        .providers()
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();

    AppResponse::ok(OAuthProvidersResponse { providers })
}
