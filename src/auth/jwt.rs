use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

const ONE_TIME_TOKEN_BYTES: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token generation failed: {0}")]
    GenerationFailed(jsonwebtoken::errors::Error),
    #[error("Token verification failed: {0}")]
    VerificationFailed(jsonwebtoken::errors::Error),
    #[error("Random source unavailable: {0}")]
    RandomSource(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub jti: String,
}

impl Claims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiration de l'access token.
    pub expires_at: DateTime<Utc>,
    pub token_type: &'static str,
}

#[derive(Clone)]
struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Émet et valide les paires access/refresh (HS256).
///
/// Access et refresh sont signés avec des secrets distincts : un refresh
/// token n'est jamais accepté comme access token, et inversement, même si
/// les deux secrets sont configurés à l'identique.
#[derive(Clone)]
pub struct TokenManager {
    access: SigningKeys,
    refresh: SigningKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl TokenManager {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Pas de tolérance d'horloge.
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "nbf", "sub"]);

        Self {
            access: SigningKeys::from_secret(access_secret.as_bytes()),
            refresh: SigningKeys::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
            validation,
        }
    }

    /// Durées par défaut : 15 minutes / 30 jours.
    pub fn with_default_ttl(access_secret: &str, refresh_secret: &str) -> Self {
        Self::new(
            access_secret,
            refresh_secret,
            Duration::minutes(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
        )
    }

    pub fn generate_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
        username: &str,
        role: &str,
    ) -> Result<TokenPair, TokenError> {
        let now = Utc::now();
        let access_expires_at = now + self.access_ttl;
        let refresh_expires_at = now + self.refresh_ttl;

        let claims = |expires_at: DateTime<Utc>| Claims {
            sub: user_id,
            email: email.to_owned(),
            username: username.to_owned(),
            role: role.to_owned(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let access_token = Self::sign(&claims(access_expires_at), &self.access.encoding)?;
        let refresh_token = Self::sign(&claims(refresh_expires_at), &self.refresh.encoding)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_at: access_expires_at,
            token_type: TOKEN_TYPE_BEARER,
        })
    }

    pub fn validate_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, &self.access.decoding)
    }

    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, &self.refresh.decoding)
    }

    pub fn generate_verification_token() -> Result<String, TokenError> {
        random_hex_token()
    }

    pub fn generate_password_reset_token() -> Result<String, TokenError> {
        random_hex_token()
    }

    fn sign(claims: &Claims, key: &EncodingKey) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, key).map_err(TokenError::GenerationFailed)
    }

    fn validate(&self, token: &str, key: &DecodingKey) -> Result<Claims, TokenError> {
        decode::<Claims>(token, key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::VerificationFailed)
    }
}

/// SHA-256 hex d'un secret brut : seule forme persistée d'un refresh token
/// ou d'un token à usage unique.
pub fn hash_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn random_hex_token() -> Result<String, TokenError> {
    let mut bytes = [0u8; ONE_TIME_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::RandomSource(e.to_string()))?;
    Ok(hex::encode(bytes))
}
