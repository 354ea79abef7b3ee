use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::PgConnection;
use uuid::Uuid;

use super::DbPool;
use crate::db::error::RepositoryError;
use crate::db::models::oauth_identity::NewOAuthIdentity;
use crate::db::models::one_time_token::{NewOneTimeToken, OneTimeToken, TokenType};
use crate::db::models::session::{NewSession, Session};
use crate::db::models::user::{NewUser, User};
use crate::db::repositories::oauth_identity_repository::OAuthIdentityRepository;
use crate::db::repositories::one_time_token_repository::OneTimeTokenRepository;
use crate::db::repositories::session_repository::SessionRepository;
use crate::db::repositories::user_repository::UserRepository;
use crate::db::repository::Repository;

/// PostgreSQL-backed [`Repository`].
///
/// Diesel is synchronous, so every call checks a connection out of the
/// r2d2 pool on the blocking thread pool instead of the async workers.
#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, RepositoryError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut *conn)
        })
        .await?
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<User, RepositoryError> {
        let (email, username) = (email.to_owned(), username.to_owned());
        let (password_hash, display_name) = (password_hash.to_owned(), display_name.to_owned());
        self.with_conn(move |conn| {
            UserRepository::create(
                conn,
                &NewUser {
                    email: &email,
                    username: &username,
                    password_hash: &password_hash,
                    display_name: &display_name,
                },
            )
        })
        .await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let email = email.to_owned();
        self.with_conn(move |conn| UserRepository::find_by_email(conn, &email))
            .await
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.with_conn(move |conn| UserRepository::find_by_id(conn, user_id))
            .await
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        self.with_conn(move |conn| UserRepository::update_last_login(conn, user_id))
            .await
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        self.with_conn(move |conn| UserRepository::mark_email_verified(conn, user_id))
            .await
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let password_hash = password_hash.to_owned();
        self.with_conn(move |conn| UserRepository::update_password(conn, user_id, &password_hash))
            .await
    }

    async fn create_session(
        &self,
        user_id: Uuid,
        token_hash: &str,
        user_agent: &str,
        client_ip: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, RepositoryError> {
        let (token_hash, user_agent, client_ip) = (
            token_hash.to_owned(),
            user_agent.to_owned(),
            client_ip.to_owned(),
        );
        self.with_conn(move |conn| {
            SessionRepository::create(
                conn,
                &NewSession {
                    user_id,
                    token_hash: &token_hash,
                    user_agent: Some(&user_agent),
                    client_ip: Some(&client_ip),
                    expires_at,
                },
            )
        })
        .await
    }

    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        let token_hash = token_hash.to_owned();
        self.with_conn(move |conn| SessionRepository::find_by_token_hash(conn, &token_hash))
            .await
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), RepositoryError> {
        let token_hash = token_hash.to_owned();
        self.with_conn(move |conn| SessionRepository::delete_by_token_hash(conn, &token_hash))
            .await
    }

    async fn delete_all_sessions(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        self.with_conn(move |conn| SessionRepository::delete_by_user(conn, user_id))
            .await
    }

    async fn create_one_time_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        token_type: TokenType,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let token_hash = token_hash.to_owned();
        self.with_conn(move |conn| {
            OneTimeTokenRepository::create(
                conn,
                &NewOneTimeToken {
                    token_hash: &token_hash,
                    user_id,
                    token_type: token_type.as_str(),
                    expires_at,
                },
            )
        })
        .await
    }

    async fn find_one_time_token(
        &self,
        token_hash: &str,
        token_type: TokenType,
    ) -> Result<Option<OneTimeToken>, RepositoryError> {
        let token_hash = token_hash.to_owned();
        self.with_conn(move |conn| {
            OneTimeTokenRepository::find_by_hash(conn, &token_hash, token_type)
        })
        .await
    }

    async fn delete_one_time_token(&self, token_hash: &str) -> Result<(), RepositoryError> {
        let token_hash = token_hash.to_owned();
        self.with_conn(move |conn| OneTimeTokenRepository::delete_by_hash(conn, &token_hash))
            .await
    }

    async fn upsert_oauth_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
        user_id: Uuid,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let (provider, provider_user_id) = (provider.to_owned(), provider_user_id.to_owned());
        let access_token = access_token.map(str::to_owned);
        let refresh_token = refresh_token.map(str::to_owned);
        self.with_conn(move |conn| {
            OAuthIdentityRepository::upsert(
                conn,
                &NewOAuthIdentity {
                    provider_name: &provider,
                    provider_user_id: &provider_user_id,
                    user_id,
                    provider_access_token: access_token.as_deref(),
                    provider_refresh_token: refresh_token.as_deref(),
                },
            )
        })
        .await
    }

    async fn find_user_by_oauth_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let (provider, provider_user_id) = (provider.to_owned(), provider_user_id.to_owned());
        self.with_conn(move |conn| {
            UserRepository::find_by_oauth_identity(conn, &provider, &provider_user_id)
        })
        .await
    }
}
