use crate::db::schema::oauth_identities;
use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use uuid::Uuid;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = oauth_identities)]
pub struct NewOAuthIdentity<'a> {
    pub provider_name: &'a str,
    pub provider_user_id: &'a str,
    pub user_id: Uuid,
    pub provider_access_token: Option<&'a str>,
    pub provider_refresh_token: Option<&'a str>,
}

#[derive(Queryable, Selectable, Debug, Clone, PartialEq)]
#[diesel(table_name = oauth_identities)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OAuthIdentity {
    pub provider_name: String,
    pub provider_user_id: String,
    pub user_id: Uuid,
    pub provider_access_token: Option<String>,
    pub provider_refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
