// src/app.rs

use std::any::Any;
use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::handlers::auth::{
    login, logout, refresh_token, register, request_password_reset, resend_verification,
    reset_password, validate_token, verify_email,
};
use crate::handlers::health::health;
use crate::handlers::oauth::list_providers;
use crate::error::AppError;
use crate::handlers::user::{change_password, get_current_user};
use crate::rate_limit::{RateLimiter, enforce};
use crate::state::AppState;

/// Configure les routes d'authentification (publiques)
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh_token))
        .route("/validate", post(validate_token))
        .route("/password-reset/request", post(request_password_reset))
        .route("/password-reset/confirm", post(reset_password))
        .route("/verify-email", post(verify_email))
        .route("/verify-email/resend", post(resend_verification))
        .route("/oauth/providers", get(list_providers))
}

/// Routes utilisateur (bearer token via `AuthenticatedUser`)
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_current_user))
        .route("/me/change-password", post(change_password))
}

/// Construit l'application complète
pub fn build_router(
    state: AppState,
    cors_origin: Option<&str>,
    rate_limiter: Option<Arc<RateLimiter>>,
) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes())
        .nest("/users", user_routes())
        .with_state(state);

    with_middleware(router, cors_origin, rate_limiter)
}

/// Une panique dans un handler devient une erreur interne ordinaire.
fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| (*s).to_string()))
        .unwrap_or_else(|| "unknown panic payload".to_string());

    AppError::internal(format!("handler panicked: {detail}")).into_response()
}

fn with_middleware(
    mut router: Router,
    cors_origin: Option<&str>,
    rate_limiter: Option<Arc<RateLimiter>>,
) -> Router {
    if let Some(limiter) = rate_limiter {
        router = router.layer(middleware::from_fn_with_state(limiter, enforce));
    }

    router = router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Middleware global de tracing
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    if let Some(origin) = cors_origin.filter(|o| !o.is_empty()) {
        match origin.parse::<HeaderValue>() {
            Ok(origin) => {
                router = router.layer(
                    CorsLayer::new()
                        .allow_origin(origin)
                        .allow_methods([Method::GET, Method::POST])
                        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
                );
            }
            Err(e) => tracing::warn!(origin, error = %e, "Invalid CORS origin, CORS disabled"),
        }
    }

    router
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::auth::jwt::TokenManager;
    use crate::auth::password::PasswordManager;
    use crate::auth::services::CredentialService;
    use crate::db::memory::InMemoryRepository;
    use crate::notifications::NotificationQueue;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use lambda_http::tower::ServiceExt; // for oneshot
    use serde_json::{Value, json};

    fn test_app() -> Router {
        let repo = Arc::new(InMemoryRepository::new());
        let tokens = Arc::new(TokenManager::with_default_ttl(
            "test_access_secret",
            "test_refresh_secret",
        ));
        let (queue, _outbox) = NotificationQueue::new(16);
        let service = CredentialService::new(repo, tokens.clone(), queue)
            .with_password_manager(PasswordManager::new(crate::auth::password::MIN_BCRYPT_COST));
        let state = AppState::new(Arc::new(service), tokens, Duration::from_secs(5));
        build_router(state, Some("http://localhost:8080"), None)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::USER_AGENT, "router-test")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router) -> Value {
        let resp = app
            .clone()
            .oneshot(post_json(
                "/auth/register",
                &json!({
                    "email": "jane@example.com",
                    "username": "jane",
                    "password": "Str0ng!Pass",
                    "display_name": "Jane Doe"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await
    }

    #[tokio::test]
    async fn health_reports_ok_with_request_id() {
        let app = test_app();

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn register_then_fetch_profile_with_bearer() {
        let app = test_app();
        let registered = register(&app).await;
        assert_eq!(registered["email_verification_required"], true);
        let access = registered["access_token"].as_str().unwrap();

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/users/me")
                    .header(header::AUTHORIZATION, format!("Bearer {access}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let profile = body_json(resp).await;
        assert_eq!(profile["email"], "jane@example.com");
        assert_eq!(profile["email_verified"], false);
    }

    #[tokio::test]
    async fn profile_requires_authorization() {
        let app = test_app();

        let resp = app
            .oneshot(Request::builder().uri("/users/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "INVALID_TOKEN_FORMAT");
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let app = test_app();
        register(&app).await;

        let resp = app
            .oneshot(post_json(
                "/auth/register",
                &json!({
                    "email": "jane@example.com",
                    "username": "jane2",
                    "password": "Str0ng!Pass"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["error"], "USER_EXISTS");
    }

    #[tokio::test]
    async fn weak_password_reports_the_missing_class() {
        let app = test_app();

        let resp = app
            .oneshot(post_json(
                "/auth/register",
                &json!({
                    "email": "jane@example.com",
                    "username": "jane",
                    "password": "NoDigitsHere!"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "PASSWORD_NO_DIGIT");
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = test_app();
        register(&app).await;

        let resp = app
            .oneshot(post_json(
                "/auth/login",
                &json!({ "email": "jane@example.com", "password": "WrongPass!1" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"], "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn refresh_rotation_over_http() {
        let app = test_app();
        let registered = register(&app).await;
        let refresh = registered["refresh_token"].as_str().unwrap().to_string();

        let first = app
            .clone()
            .oneshot(post_json("/auth/refresh", &json!({ "refresh_token": refresh })))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let replay = app
            .oneshot(post_json("/auth/refresh", &json!({ "refresh_token": refresh })))
            .await
            .unwrap();
        assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(replay).await["error"], "SESSION_NOT_FOUND");
    }

    #[tokio::test]
    async fn validate_reports_invalid_tokens_in_the_body() {
        let app = test_app();

        let resp = app
            .oneshot(post_json(
                "/auth/validate",
                &json!({ "access_token": "not-a-token" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["is_valid"], false);
        assert!(body.get("user_id").is_none());
    }

    #[tokio::test]
    async fn password_reset_request_never_reveals_accounts() {
        let app = test_app();

        let resp = app
            .oneshot(post_json(
                "/auth/password-reset/request",
                &json!({ "email": "ghost@example.com" }),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["success"], true);
    }

    #[tokio::test]
    async fn blank_required_field_is_a_validation_error() {
        let app = test_app();

        let resp = app
            .oneshot(post_json("/auth/logout", &json!({ "refresh_token": "  " })))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn malformed_json_uses_the_error_body() {
        let app = test_app();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/auth/login")
                    .method("POST")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn oauth_providers_empty_when_none_configured() {
        let app = test_app();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/auth/oauth/providers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["providers"], json!([]));
    }

    async fn failing_handler() -> &'static str {
        panic!("handler failure")
    }

    #[tokio::test]
    async fn handler_panic_becomes_internal_error() {
        let app = with_middleware(
            Router::new().route("/boom", get(failing_handler)),
            None,
            None,
        );

        let resp = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.headers().contains_key("x-request-id"));
        let body = body_json(resp).await;
        assert_eq!(body["error"], "INTERNAL_ERROR");
        assert!(!body["message"].as_str().unwrap().contains("handler failure"));
    }

    #[tokio::test]
    async fn requests_beyond_the_burst_are_rejected_with_429() {
        let app = with_middleware(
            Router::new().route("/health", get(health)),
            None,
            RateLimiter::new(1, 2).map(Arc::new),
        );

        let mut statuses = Vec::new();
        for _ in 0..3 {
            let resp = app
                .clone()
                .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            statuses.push(resp.status());
            if resp.status() == StatusCode::TOO_MANY_REQUESTS {
                assert_eq!(body_json(resp).await["error"], "RATE_LIMIT_EXCEEDED");
            }
        }

        assert_eq!(
            statuses,
            [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        );
    }
}
