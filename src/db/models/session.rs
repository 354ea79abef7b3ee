use crate::db::schema::user_sessions;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = user_sessions)]
pub struct NewSession<'a> {
    pub user_id: Uuid,
    pub token_hash: &'a str,
    pub user_agent: Option<&'a str>,
    pub client_ip: Option<&'a str>,
    pub expires_at: DateTime<Utc>,
}

/// One row per live refresh token. Only the SHA-256 of the token is kept.
#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = user_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub user_agent: Option<String>,
    pub client_ip: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
