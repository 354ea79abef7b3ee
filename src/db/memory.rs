use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::error::RepositoryError;
use crate::db::models::oauth_identity::OAuthIdentity;
use crate::db::models::one_time_token::{OneTimeToken, TokenType};
use crate::db::models::session::Session;
use crate::db::models::user::{DEFAULT_ROLE, User};
use crate::db::repository::Repository;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    tokens: HashMap<String, OneTimeToken>,
    identities: HashMap<(String, String), OAuthIdentity>,
}

impl Tables {
    // Purge à l'écriture : les lignes expirées ne sont jamais relues.
    fn prune_expired(&mut self) {
        let now = Utc::now();
        self.sessions.retain(|_, s| s.expires_at > now);
        self.tokens.retain(|_, t| t.expires_at > now);
    }
}

/// In-process [`Repository`] used in development without a database and
/// by the test suite. Enforces the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update_user<F>(&self, user_id: Uuid, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut User) + Send,
    {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {user_id}")))?;
        apply(user);
        user.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        display_name: &str,
    ) -> Result<User, RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(RepositoryError::UniqueViolation(
                "users_email_key".to_string(),
            ));
        }
        if tables.users.values().any(|u| u.username == username) {
            return Err(RepositoryError::UniqueViolation(
                "users_username_key".to_string(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            username: username.to_owned(),
            password_hash: password_hash.to_owned(),
            display_name: display_name.to_owned(),
            role: DEFAULT_ROLE.to_owned(),
            is_active: true,
            avatar_url: None,
            email_verified_at: None,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).cloned())
    }

    async fn update_last_login(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        self.update_user(user_id, |user| user.last_login_at = Some(Utc::now()))
            .await
    }

    async fn mark_email_verified(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        self.update_user(user_id, |user| user.email_verified_at = Some(Utc::now()))
            .await
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let password_hash = password_hash.to_owned();
        self.update_user(user_id, move |user| user.password_hash = password_hash)
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
        let mut tables = self.tables.write().await;
        tables.prune_expired();
        if !tables.users.contains_key(&user_id) {
            return Err(RepositoryError::ForeignKeyViolation(
                "user_sessions_user_id_fkey".to_string(),
            ));
        }
        if tables.sessions.contains_key(token_hash) {
            return Err(RepositoryError::UniqueViolation(
                "user_sessions_token_hash_key".to_string(),
            ));
        }

        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token_hash.to_owned(),
            user_agent: Some(user_agent.to_owned()),
            client_ip: Some(client_ip.to_owned()),
            expires_at,
            created_at: Utc::now(),
        };
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(session)
    }

    async fn find_session_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        let tables = self.tables.read().await;
        let now = Utc::now();
        Ok(tables
            .sessions
            .get(token_hash)
            .filter(|s| s.expires_at > now)
            .cloned())
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), RepositoryError> {
        self.tables.write().await.sessions.remove(token_hash);
        Ok(())
    }

    async fn delete_all_sessions(&self, user_id: Uuid) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .await
            .sessions
            .retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn create_one_time_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        token_type: TokenType,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        tables.prune_expired();
        if tables.tokens.contains_key(token_hash) {
            return Err(RepositoryError::UniqueViolation(
                "user_tokens_pkey".to_string(),
            ));
        }
        tables.tokens.insert(
            token_hash.to_owned(),
            OneTimeToken {
                token_hash: token_hash.to_owned(),
                user_id,
                token_type: token_type.as_str().to_owned(),
                expires_at,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn find_one_time_token(
        &self,
        token_hash: &str,
        token_type: TokenType,
    ) -> Result<Option<OneTimeToken>, RepositoryError> {
        let tables = self.tables.read().await;
        let now = Utc::now();
        Ok(tables
            .tokens
            .get(token_hash)
            .filter(|t| t.token_type == token_type.as_str() && t.expires_at > now)
            .cloned())
    }

    async fn delete_one_time_token(&self, token_hash: &str) -> Result<(), RepositoryError> {
        self.tables.write().await.tokens.remove(token_hash);
        Ok(())
    }

    async fn upsert_oauth_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
        user_id: Uuid,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let key = (provider.to_owned(), provider_user_id.to_owned());
        tables
            .identities
            .entry(key)
            .and_modify(|identity| {
                identity.provider_access_token = access_token.map(str::to_owned);
                identity.provider_refresh_token = refresh_token.map(str::to_owned);
                identity.updated_at = now;
            })
            .or_insert_with(|| OAuthIdentity {
                provider_name: provider.to_owned(),
                provider_user_id: provider_user_id.to_owned(),
                user_id,
                provider_access_token: access_token.map(str::to_owned),
                provider_refresh_token: refresh_token.map(str::to_owned),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn find_user_by_oauth_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let tables = self.tables.read().await;
        let key = (provider.to_owned(), provider_user_id.to_owned());
        Ok(tables
            .identities
            .get(&key)
            .and_then(|identity| tables.users.get(&identity.user_id))
            .cloned())
    }
}

/// Inspection helpers for tests.
#[cfg(test)]
impl InMemoryRepository {
    /// Nombre de sessions (expirées comprises) pour un utilisateur.
    pub async fn session_count(&self, user_id: Uuid) -> usize {
        let tables = self.tables.read().await;
        tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .count()
    }

    pub async fn sessions_for(&self, user_id: Uuid) -> Vec<Session> {
        let tables = self.tables.read().await;
        tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn one_time_tokens_for(&self, user_id: Uuid, token_type: TokenType) -> usize {
        let tables = self.tables.read().await;
        tables
            .tokens
            .values()
            .filter(|t| t.user_id == user_id && t.token_type == token_type.as_str())
            .count()
    }

    pub async fn set_active(&self, user_id: Uuid, is_active: bool) -> Result<(), RepositoryError> {
        self.update_user(user_id, |user| user.is_active = is_active)
            .await
    }

    pub async fn oauth_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> Option<OAuthIdentity> {
        let tables = self.tables.read().await;
        tables
            .identities
            .get(&(provider.to_owned(), provider_user_id.to_owned()))
            .cloned()
    }
}
