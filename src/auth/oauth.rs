// src/auth/oauth.rs

use std::collections::BTreeMap;

use credential_api::SessionMetadata;

use crate::auth::context::RequestContext;
use crate::auth::jwt::{TokenManager, TokenPair};
use crate::auth::services::CredentialService;
use crate::config::OAuthConfig;
use crate::db::models::user::User;
use crate::error::AppError;
use crate::notifications::Notification;

pub const GOOGLE: &str = "google";
pub const APPLE: &str = "apple";

/// Fournisseur OAuth enregistré au démarrage.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthProvider {
    pub name: &'static str,
    pub client_id: String,
    client_secret: String,
    pub callback_url: String,
    pub scopes: Vec<&'static str>,
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("callback_url", &self.callback_url)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

impl OAuthProvider {
    fn new(
        name: &'static str,
        client_id: &str,
        client_secret: &str,
        callback_base: &str,
        scopes: Vec<&'static str>,
    ) -> Self {
        Self {
            name,
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
            callback_url: format!("{}/{name}/callback", callback_base.trim_end_matches('/')),
            scopes,
        }
    }

    #[allow(dead_code, reason = "read by the provider redirect handshake")]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

/// Fournisseurs disponibles, construits une fois au démarrage puis injectés.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<&'static str, OAuthProvider>,
}

impl ProviderRegistry {
    /// Un fournisseur n'est enregistré que si son id et son secret sont définis.
    pub fn from_config(config: &OAuthConfig) -> Self {
        let mut registry = Self::default();

        if !config.google_client_id.is_empty() && !config.google_client_secret.is_empty() {
            registry.register(OAuthProvider::new(
                GOOGLE,
                &config.google_client_id,
                &config.google_client_secret,
                &config.callback_url,
                vec!["email", "profile"],
            ));
        }

        if !config.apple_client_id.is_empty() && !config.apple_secret.is_empty() {
            registry.register(OAuthProvider::new(
                APPLE,
                &config.apple_client_id,
                &config.apple_secret,
                &config.callback_url,
                vec!["name", "email"],
            ));
        }

        tracing::info!(providers = ?registry.names(), "OAuth providers registered");
        registry
    }

    pub fn register(&mut self, provider: OAuthProvider) {
        self.providers.insert(provider.name, provider);
    }

    #[allow(dead_code, reason = "read by the provider redirect handshake")]
    pub fn get(&self, name: &str) -> Option<&OAuthProvider> {
        self.providers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Noms triés.
    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }
}

/// Profil résolu par le fournisseur à l'issue de la redirection.
#[derive(Debug, Clone, Default)]
pub struct ExternalIdentity {
    pub provider: String,
    pub provider_user_id: String,
    pub email: String,
    pub name: String,
    pub nickname: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OAuthLoginResult {
    pub user: User,
    pub tokens: TokenPair,
    pub is_new_user: bool,
}

impl CredentialService {
    /// Rattache une identité externe à un compte local (créé au besoin)
    /// puis ouvre une session comme une connexion classique.
    #[allow(dead_code, reason = "invoked once the provider redirect handshake resolves")]
    pub async fn oauth_login(
        &self,
        ctx: &RequestContext,
        identity: ExternalIdentity,
        metadata: &SessionMetadata,
    ) -> Result<OAuthLoginResult, AppError> {
        ctx.run(async {
            if !self.providers.contains(&identity.provider) {
                return Err(AppError::UnsupportedProvider(identity.provider.clone()));
            }

            let existing = self
                .repo
                .find_user_by_oauth_identity(&identity.provider, &identity.provider_user_id)
                .await
                .map_err(internal)?;

            let (user, is_new_user) = match existing {
                Some(user) => {
                    self.repo
                        .upsert_oauth_identity(
                            &identity.provider,
                            &identity.provider_user_id,
                            user.id,
                            identity.access_token.as_deref(),
                            identity.refresh_token.as_deref(),
                        )
                        .await
                        .map_err(internal)?;
                    (user, false)
                }
                None => (self.create_oauth_user(&identity).await?, true),
            };

            let tokens = self.complete_login(&user, metadata).await?;

            tracing::info!(
                user_id = %user.id,
                provider = %identity.provider,
                is_new_user,
                "OAuth login"
            );

            Ok(OAuthLoginResult {
                user,
                tokens,
                is_new_user,
            })
        })
        .await
    }

    async fn create_oauth_user(&self, identity: &ExternalIdentity) -> Result<User, AppError> {
        let username = identity
            .nickname
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&identity.email);

        // Mot de passe aléatoire jamais communiqué : le compte ne peut pas
        // se connecter par mot de passe avant une réinitialisation.
        let unusable = TokenManager::generate_password_reset_token()
            .map_err(|e| AppError::internal(e.to_string()))?;
        let password_hash = self.hash_password(&unusable).await?;

        let user = self
            .repo
            .create_user(&identity.email, username, &password_hash, &identity.name)
            .await
            .map_err(internal)?;

        self.repo
            .mark_email_verified(user.id)
            .await
            .map_err(internal)?;
        self.repo
            .upsert_oauth_identity(
                &identity.provider,
                &identity.provider_user_id,
                user.id,
                identity.access_token.as_deref(),
                identity.refresh_token.as_deref(),
            )
            .await
            .map_err(internal)?;

        self.notifications.enqueue(Notification::Welcome {
            to_email: user.email.clone(),
            to_name: user.display_name.clone(),
        });

        // Relu pour refléter la vérification de l'email.
        self.repo
            .find_user_by_id(user.id)
            .await
            .map_err(internal)?
            .ok_or_else(|| AppError::internal("OAuth user vanished after creation"))
    }
}

fn internal(err: crate::db::error::RepositoryError) -> AppError {
    AppError::internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::jwt::hash_token;
    use crate::auth::services::test_support::Harness;
    use crate::db::Repository;

    fn oauth_config() -> OAuthConfig {
        OAuthConfig {
            google_client_id: "google-id".into(),
            google_client_secret: "google-secret".into(),
            apple_client_id: "apple-id".into(),
            apple_secret: String::new(),
            callback_url: "https://auth.example.com/auth/oauth/".into(),
        }
    }

    fn harness() -> Harness {
        let mut h = Harness::new();
        h.service = h
            .service
            .with_providers(Arc::new(ProviderRegistry::from_config(&oauth_config())));
        h
    }

    fn google_identity() -> ExternalIdentity {
        ExternalIdentity {
            provider: GOOGLE.into(),
            provider_user_id: "g-123".into(),
            email: "jane@gmail.com".into(),
            name: "Jane Doe".into(),
            nickname: Some("janed".into()),
            access_token: Some("ya29.first".into()),
            refresh_token: Some("1//first".into()),
        }
    }

    #[test]
    fn registry_only_keeps_fully_configured_providers() {
        let registry = ProviderRegistry::from_config(&oauth_config());

        assert_eq!(registry.names(), vec![GOOGLE]);
        let google = registry.get(GOOGLE).unwrap();
        assert_eq!(
            google.callback_url,
            "https://auth.example.com/auth/oauth/google/callback"
        );
        assert_eq!(google.scopes, vec!["email", "profile"]);
        assert_eq!(google.client_secret(), "google-secret");
        assert!(!format!("{google:?}").contains("google-secret"));
    }

    #[test]
    fn apple_uses_name_and_email_scopes() {
        let mut config = oauth_config();
        config.apple_secret = "apple-secret".into();

        let registry = ProviderRegistry::from_config(&config);

        assert_eq!(registry.names(), vec![APPLE, GOOGLE]);
        assert_eq!(registry.get(APPLE).unwrap().scopes, vec!["name", "email"]);
    }

    #[test]
    fn empty_config_registers_nothing() {
        assert!(ProviderRegistry::from_config(&OAuthConfig::default()).names().is_empty());
    }

    #[tokio::test]
    async fn first_oauth_login_creates_verified_user_and_links_identity() {
        let mut h = harness();

        let result = h
            .service
            .oauth_login(
                &RequestContext::default(),
                google_identity(),
                &SessionMetadata::default(),
            )
            .await
            .unwrap();

        assert!(result.is_new_user);
        assert_eq!(result.user.username, "janed");
        assert_eq!(result.user.display_name, "Jane Doe");
        assert!(result.user.is_email_verified());

        let link = h.repo.oauth_identity(GOOGLE, "g-123").await.unwrap();
        assert_eq!(link.user_id, result.user.id);
        assert_eq!(link.provider_access_token.as_deref(), Some("ya29.first"));

        let sessions = h.repo.sessions_for(result.user.id).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].token_hash, hash_token(&result.tokens.refresh_token));

        let user = h.repo.find_user_by_id(result.user.id).await.unwrap().unwrap();
        assert!(user.last_login_at.is_some());

        let sent = h.drain_outbox();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind(), "welcome");
    }

    #[tokio::test]
    async fn returning_oauth_user_gets_tokens_updated_not_a_new_account() {
        let mut h = harness();
        let ctx = RequestContext::default();
        let first = h
            .service
            .oauth_login(&ctx, google_identity(), &SessionMetadata::default())
            .await
            .unwrap();
        h.drain_outbox();

        let mut again = google_identity();
        again.access_token = Some("ya29.second".into());
        let second = h
            .service
            .oauth_login(&ctx, again, &SessionMetadata::default())
            .await
            .unwrap();

        assert!(!second.is_new_user);
        assert_eq!(second.user.id, first.user.id);
        let link = h.repo.oauth_identity(GOOGLE, "g-123").await.unwrap();
        assert_eq!(link.provider_access_token.as_deref(), Some("ya29.second"));
        assert!(h.drain_outbox().is_empty());
    }

    #[tokio::test]
    async fn username_falls_back_to_email_without_nickname() {
        let h = harness();
        let identity = ExternalIdentity {
            nickname: None,
            ..google_identity()
        };

        let result = h
            .service
            .oauth_login(
                &RequestContext::default(),
                identity,
                &SessionMetadata::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.user.username, "jane@gmail.com");
    }

    #[tokio::test]
    async fn oauth_account_cannot_log_in_with_a_guessed_password() {
        let h = harness();
        let result = h
            .service
            .oauth_login(
                &RequestContext::default(),
                google_identity(),
                &SessionMetadata::default(),
            )
            .await
            .unwrap();

        let user = h.repo.find_user_by_id(result.user.id).await.unwrap().unwrap();
        assert!(!crate::auth::password::PasswordManager::verify(
            "",
            &user.password_hash
        ));
    }

    #[tokio::test]
    async fn unregistered_provider_is_rejected() {
        let h = harness();
        let identity = ExternalIdentity {
            provider: "github".into(),
            ..google_identity()
        };

        let err = h
            .service
            .oauth_login(
                &RequestContext::default(),
                identity,
                &SessionMetadata::default(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, AppError::UnsupportedProvider("github".into()));
    }

    #[tokio::test]
    async fn email_taken_by_password_account_surfaces_as_internal() {
        let h = harness();
        h.register("jane@gmail.com", "jane").await;

        let err = h
            .service
            .oauth_login(
                &RequestContext::default(),
                google_identity(),
                &SessionMetadata::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn deactivated_oauth_user_is_refused() {
        let h = harness();
        let ctx = RequestContext::default();
        let first = h
            .service
            .oauth_login(&ctx, google_identity(), &SessionMetadata::default())
            .await
            .unwrap();
        h.repo.set_active(first.user.id, false).await.unwrap();

        let err = h
            .service
            .oauth_login(&ctx, google_identity(), &SessionMetadata::default())
            .await
            .unwrap_err();

        assert_eq!(err, AppError::AccountInactive);
    }
}
