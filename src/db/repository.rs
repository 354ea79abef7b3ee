use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::error::RepositoryError;
use crate::db::models::one_time_token::{OneTimeToken, TokenType};
use crate::db::models::session::Session;
use crate::db::models::user::User;

/// Persistence contract consumed by the credential service.
///
/// Implementations must be safe to share between concurrent requests.
/// Uniqueness of email, username, session hash and `(provider,
/// provider_user_id)` is enforced here and surfaces as
/// [`RepositoryError::UniqueViolation`].
#[async_trait]
pub trait Repository: Send + Sync {
    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<User, RepositoryError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError>;
    async fn update_last_login(&self, user_id: Uuid) -> Result<(), RepositoryError>;
    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), RepositoryError>;
    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepositoryError>;

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        user_agent: &str,
        client_ip: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, RepositoryError>;
    /// Expired sessions are never returned.
    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError>;
    /// Deleting an absent session is not an error.
    async fn delete_session(&self, token_hash: &str) -> Result<(), RepositoryError>;
    async fn delete_all_sessions(&self, user_id: Uuid) -> Result<(), RepositoryError>;

    async fn create_one_time_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        token_type: TokenType,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    /// Only a live token of the requested type matches.
    async fn find_one_time_token(
        &self,
        token_hash: &str,
        token_type: TokenType,
    ) -> Result<Option<OneTimeToken>, RepositoryError>;
    async fn delete_one_time_token(&self, token_hash: &str) -> Result<(), RepositoryError>;

    async fn upsert_oauth_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
        user_id: Uuid,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), RepositoryError>;
    async fn find_user_by_oauth_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, RepositoryError>;
}
