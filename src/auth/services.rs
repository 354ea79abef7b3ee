// src/auth/services.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use credential_api::SessionMetadata;
use uuid::Uuid;

use crate::auth::context::RequestContext;
use crate::auth::extractors::AuthenticatedUser;
use crate::auth::jwt::{Claims, TokenManager, TokenPair, hash_token};
use crate::auth::oauth::ProviderRegistry;
use crate::auth::password::PasswordManager;
use crate::db::Repository;
use crate::db::error::RepositoryError;
use crate::db::models::one_time_token::TokenType;
use crate::db::models::user::User;
use crate::error::AppError;
use crate::notifications::{Notification, NotificationQueue};

pub const DEFAULT_SESSION_TTL_DAYS: i64 = 30;
const UNKNOWN_METADATA: &str = "unknown";

#[derive(Debug, Clone)]
pub struct RegisterParams {
    pub email: String,
    pub username: String,
    pub password: String,
    pub display_name: String,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone)]
pub struct RegisterResult {
    pub user: User,
    pub tokens: TokenPair,
    pub email_verification_required: bool,
}

#[derive(Debug, Clone)]
pub struct LoginParams {
    pub email: String,
    pub password: String,
    pub metadata: SessionMetadata,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResendVerificationResult {
    pub already_verified: bool,
}

/// Cycle de vie des identifiants et des sessions.
///
/// Seul composant qui parle au [`Repository`] et à la file de
/// notifications. Chaque opération s'exécute sous le [`RequestContext`]
/// de la requête ; les emails partent via la file et ne dépendent pas de
/// ce contexte.
pub struct CredentialService {
    pub(super) repo: Arc<dyn Repository>,
    pub(super) tokens: Arc<TokenManager>,
    pub(super) passwords: PasswordManager,
    pub(super) notifications: NotificationQueue,
    pub(super) providers: Arc<ProviderRegistry>,
    pub(super) session_ttl: Duration,
}

impl CredentialService {
    pub fn new(
        repo: Arc<dyn Repository>,
        tokens: Arc<TokenManager>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            repo,
            tokens,
            passwords: PasswordManager::default(),
            notifications,
            providers: Arc::new(ProviderRegistry::default()),
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
        }
    }

    #[must_use]
    pub fn with_password_manager(mut self, passwords: PasswordManager) -> Self {
        self.passwords = passwords;
        self
    }

    #[must_use]
    pub fn with_providers(mut self, providers: Arc<ProviderRegistry>) -> Self {
        self.providers = providers;
        self
    }

    /// Une durée nulle ou négative garde la valeur par défaut.
    #[must_use]
    pub fn with_session_ttl(mut self, session_ttl: Duration) -> Self {
        if session_ttl > Duration::zero() {
            self.session_ttl = session_ttl;
        }
        self
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Inscription d'un nouvel utilisateur
    pub async fn register(
        &self,
        ctx: &RequestContext,
        params: RegisterParams,
    ) -> Result<RegisterResult, AppError> {
        ctx.run(async {
            PasswordManager::validate(&params.password)?;

            if self.repo.find_user_by_email(&params.email).await?.is_some() {
                return Err(AppError::UserAlreadyExists);
            }

            let password_hash = self.hash_password(&params.password).await?;

            // Le contrôle ci-dessus n'est pas atomique : la contrainte
            // d'unicité tranche les inscriptions concurrentes.
            let user = self
                .repo
                .create_user(
                    &params.email,
                    &params.username,
                    &password_hash,
                    &params.display_name,
                )
                .await
                .map_err(|e| match e {
                    RepositoryError::UniqueViolation(_) => AppError::UserAlreadyExists,
                    other => AppError::from(other),
                })?;

            let tokens = self.start_session(&user, &params.metadata).await?;
            self.send_email_verification(&user).await?;

            tracing::info!(user_id = %user.id, "User registered");

            Ok(RegisterResult {
                user,
                tokens,
                email_verification_required: true,
            })
        })
        .await
    }

    /// Connexion d'un utilisateur
    pub async fn login(
        &self,
        ctx: &RequestContext,
        params: LoginParams,
    ) -> Result<LoginResult, AppError> {
        ctx.run(async {
            // Utilisateur inconnu et mauvais mot de passe sont indiscernables.
            let user = self
                .repo
                .find_user_by_email(&params.email)
                .await?
                .ok_or(AppError::InvalidCredentials)?;

            // Compte désactivé : refusé avant même de payer le coût bcrypt.
            if !user.is_active {
                return Err(AppError::AccountInactive);
            }

            if !self
                .verify_password(&params.password, &user.password_hash)
                .await?
            {
                tracing::debug!(user_id = %user.id, "Login rejected: wrong password");
                return Err(AppError::InvalidCredentials);
            }

            let tokens = self.complete_login(&user, &params.metadata).await?;
            tracing::info!(user_id = %user.id, "User logged in");

            Ok(LoginResult { user, tokens })
        })
        .await
    }

    /// Déconnexion : supprime la session du refresh token. Idempotent.
    pub async fn logout(&self, ctx: &RequestContext, refresh_token: &str) -> Result<(), AppError> {
        ctx.run(async {
            self.repo
                .delete_session(&hash_token(refresh_token))
                .await?;
            Ok(())
        })
        .await
    }

    /// Rotation : l'ancienne session est supprimée avant la création de la
    /// nouvelle. Un refresh token déjà consommé ne retrouve jamais de session.
    pub async fn refresh_tokens(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
        metadata: &SessionMetadata,
    ) -> Result<TokenPair, AppError> {
        ctx.run(async {
            let claims = self.tokens.validate_refresh_token(refresh_token)?;

            let token_hash = hash_token(refresh_token);
            self.repo
                .find_session_by_token_hash(&token_hash)
                .await?
                .ok_or(AppError::SessionNotFound)?;

            let user = self
                .repo
                .find_user_by_id(claims.sub)
                .await?
                .ok_or(AppError::UserNotFound)?;

            if !user.is_active {
                return Err(AppError::AccountInactive);
            }

            self.repo.delete_session(&token_hash).await?;
            let tokens = self.start_session(&user, metadata).await?;

            tracing::debug!(user_id = %user.id, "Refresh token rotated");
            Ok(tokens)
        })
        .await
    }

    pub async fn validate_access_token(
        &self,
        ctx: &RequestContext,
        access_token: &str,
    ) -> Result<Claims, AppError> {
        ctx.run(async { Ok(self.tokens.validate_access_token(access_token)?) })
            .await
    }

    /// Réussit toujours vu de l'extérieur, que l'email existe ou non.
    pub async fn request_password_reset(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<(), AppError> {
        ctx.run(async {
            let Some(user) = self.repo.find_user_by_email(email).await? else {
                tracing::debug!("Password reset requested for unknown email");
                return Ok(());
            };

            let token = TokenManager::generate_password_reset_token()?;
            self.store_one_time_token(&user, &token, TokenType::PasswordReset)
                .await?;

            self.notifications.enqueue(Notification::PasswordReset {
                to_email: user.email.clone(),
                to_name: user.display_name.clone(),
                token,
            });

            tracing::info!(user_id = %user.id, "Password reset requested");
            Ok(())
        })
        .await
    }

    pub async fn reset_password(
        &self,
        ctx: &RequestContext,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        ctx.run(async {
            PasswordManager::validate(new_password)?;

            let token_hash = hash_token(reset_token);
            let token = self
                .repo
                .find_one_time_token(&token_hash, TokenType::PasswordReset)
                .await?
                .ok_or(AppError::InvalidToken)?;

            let password_hash = self.hash_password(new_password).await?;
            self.repo
                .update_password_hash(token.user_id, &password_hash)
                .await?;
            self.repo.delete_one_time_token(&token_hash).await?;
            self.repo.delete_all_sessions(token.user_id).await?;

            tracing::info!(user_id = %token.user_id, "Password reset, all sessions revoked");
            Ok(())
        })
        .await
    }

    /// Change le mot de passe de l'utilisateur et révoque toutes ses sessions
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        caller: &AuthenticatedUser,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        ctx.run(async {
            let user = self
                .repo
                .find_user_by_id(caller.user_id)
                .await?
                .ok_or(AppError::UserNotFound)?;

            if !self
                .verify_password(current_password, &user.password_hash)
                .await?
            {
                return Err(AppError::InvalidCredentials);
            }

            PasswordManager::validate(new_password)?;

            let password_hash = self.hash_password(new_password).await?;
            self.repo
                .update_password_hash(user.id, &password_hash)
                .await?;
            self.repo.delete_all_sessions(user.id).await?;

            tracing::info!(user_id = %user.id, "Password changed, all sessions revoked");
            Ok(())
        })
        .await
    }

    /// Consomme un token de vérification ; retourne l'id de l'utilisateur.
    pub async fn verify_email(
        &self,
        ctx: &RequestContext,
        verification_token: &str,
    ) -> Result<Uuid, AppError> {
        ctx.run(async {
            let token_hash = hash_token(verification_token);
            let token = self
                .repo
                .find_one_time_token(&token_hash, TokenType::EmailVerification)
                .await?
                .ok_or(AppError::InvalidToken)?;

            self.repo.mark_email_verified(token.user_id).await?;
            self.repo.delete_one_time_token(&token_hash).await?;

            match self.repo.find_user_by_id(token.user_id).await {
                Ok(Some(user)) => self.notifications.enqueue(Notification::Welcome {
                    to_email: user.email,
                    to_name: user.display_name,
                }),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(user_id = %token.user_id, error = %e, "Welcome email skipped");
                }
            }

            tracing::info!(user_id = %token.user_id, "Email verified");
            Ok(token.user_id)
        })
        .await
    }

    /// Même politique anti-énumération que `request_password_reset`.
    pub async fn resend_verification_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<ResendVerificationResult, AppError> {
        ctx.run(async {
            let Some(user) = self.repo.find_user_by_email(email).await? else {
                return Ok(ResendVerificationResult::default());
            };

            if user.is_email_verified() {
                return Ok(ResendVerificationResult {
                    already_verified: true,
                });
            }

            self.send_email_verification(&user).await?;
            Ok(ResendVerificationResult::default())
        })
        .await
    }

    /// Profil de l'appelant authentifié
    pub async fn current_user(
        &self,
        ctx: &RequestContext,
        caller: &AuthenticatedUser,
    ) -> Result<User, AppError> {
        ctx.run(async {
            self.repo
                .find_user_by_id(caller.user_id)
                .await?
                .ok_or(AppError::UserNotFound)
        })
        .await
    }

    // === Helpers ===

    /// Dernière étape commune à la connexion par mot de passe et OAuth.
    pub(super) async fn complete_login(
        &self,
        user: &User,
        metadata: &SessionMetadata,
    ) -> Result<TokenPair, AppError> {
        if !user.is_active {
            return Err(AppError::AccountInactive);
        }

        let tokens = self.start_session(user, metadata).await?;

        if let Err(e) = self.repo.update_last_login(user.id).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to update last login");
        }

        Ok(tokens)
    }

    /// Émet une paire de tokens et enregistre la session du refresh token.
    async fn start_session(
        &self,
        user: &User,
        metadata: &SessionMetadata,
    ) -> Result<TokenPair, AppError> {
        let tokens =
            self.tokens
                .generate_token_pair(user.id, &user.email, &user.username, &user.role)?;

        let user_agent = non_empty_or_unknown(metadata.user_agent.as_deref());
        let client_ip = non_empty_or_unknown(metadata.client_ip.as_deref());

        self.repo
            .create_session(
                user.id,
                &hash_token(&tokens.refresh_token),
                user_agent,
                client_ip,
                Utc::now() + self.session_ttl,
            )
            .await?;

        Ok(tokens)
    }

    async fn send_email_verification(&self, user: &User) -> Result<(), AppError> {
        let token = TokenManager::generate_verification_token()?;
        self.store_one_time_token(user, &token, TokenType::EmailVerification)
            .await?;

        self.notifications.enqueue(Notification::Verification {
            to_email: user.email.clone(),
            to_name: user.display_name.clone(),
            token,
        });
        Ok(())
    }

    async fn store_one_time_token(
        &self,
        user: &User,
        raw_token: &str,
        token_type: TokenType,
    ) -> Result<(), AppError> {
        self.repo
            .create_one_time_token(
                user.id,
                &hash_token(raw_token),
                token_type,
                Utc::now() + token_type.ttl(),
            )
            .await?;
        Ok(())
    }

    // bcrypt est volontairement lent : hors du runtime async.
    pub(super) async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let passwords = self.passwords;
        let password = password.to_owned();
        let hashed = tokio::task::spawn_blocking(move || passwords.hash(&password))
            .await
            .map_err(|e| AppError::internal(format!("hashing task failed: {e}")))?;
        Ok(hashed?)
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || PasswordManager::verify(&password, &hash))
            .await
            .map_err(|e| AppError::internal(format!("verification task failed: {e}")))
    }
}

fn non_empty_or_unknown(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN_METADATA,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::memory::InMemoryRepository;
    use tokio::sync::mpsc;

    pub struct Harness {
        pub service: CredentialService,
        pub repo: Arc<InMemoryRepository>,
        pub tokens: Arc<TokenManager>,
        pub outbox: mpsc::Receiver<Notification>,
    }

    impl Harness {
        pub fn new() -> Self {
            let repo = Arc::new(InMemoryRepository::new());
            let tokens = Arc::new(TokenManager::with_default_ttl(
                "access_secret_for_tests",
                "refresh_secret_for_tests",
            ));
            let (queue, outbox) = NotificationQueue::new(32);
            let service = CredentialService::new(repo.clone(), tokens.clone(), queue)
                .with_password_manager(PasswordManager::new(crate::auth::password::MIN_BCRYPT_COST));
            Self {
                service,
                repo,
                tokens,
                outbox,
            }
        }

        /// Vide la file et retourne ce qui aurait été envoyé.
        pub fn drain_outbox(&mut self) -> Vec<Notification> {
            let mut sent = Vec::new();
            while let Ok(n) = self.outbox.try_recv() {
                sent.push(n);
            }
            sent
        }

        pub async fn register(&self, email: &str, username: &str) -> RegisterResult {
            self.service
                .register(
                    &RequestContext::default(),
                    RegisterParams {
                        email: email.into(),
                        username: username.into(),
                        password: PASSWORD.into(),
                        display_name: "Jane Doe".into(),
                        metadata: SessionMetadata::default(),
                    },
                )
                .await
                .expect("registration should succeed")
        }
    }

    pub const PASSWORD: &str = "Str0ng!Pass";
}
