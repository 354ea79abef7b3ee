use crate::db::schema::user_tokens;
use chrono::{DateTime, Duration, Utc};
use diesel::{Insertable, Queryable, Selectable};
use std::fmt;
use uuid::Uuid;

/// Scope of a single-use token. A token issued for one purpose never
/// satisfies a lookup for the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    EmailVerification,
    PasswordReset,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }

    /// Durée de validité d'un token de ce type.
    pub fn ttl(self) -> Duration {
        match self {
            Self::EmailVerification => Duration::hours(24),
            Self::PasswordReset => Duration::hours(1),
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = user_tokens)]
pub struct NewOneTimeToken<'a> {
    pub token_hash: &'a str,
    pub user_id: Uuid,
    pub token_type: &'a str,
    pub expires_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = user_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OneTimeToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
