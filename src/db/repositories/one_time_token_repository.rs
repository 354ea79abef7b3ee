use crate::db::error::RepositoryError;
use crate::db::models::one_time_token::{NewOneTimeToken, OneTimeToken, TokenType};
use crate::db::schema::user_tokens;
use chrono::Utc;
use diesel::prelude::*;

pub struct OneTimeTokenRepository;

impl OneTimeTokenRepository {
    pub fn create(
        conn: &mut PgConnection,
        new_token: &NewOneTimeToken<'_>,
    ) -> Result<(), RepositoryError> {
        diesel::insert_into(user_tokens::table)
            .values(new_token)
            .execute(conn)?;
        Ok(())
    }

    pub fn find_by_hash(
        conn: &mut PgConnection,
        hash: &str,
        token_type: TokenType,
    ) -> Result<Option<OneTimeToken>, RepositoryError> {
        user_tokens::table
            .filter(user_tokens::token_hash.eq(hash))
            .filter(user_tokens::token_type.eq(token_type.as_str()))
            .filter(user_tokens::expires_at.gt(Utc::now()))
            .select(OneTimeToken::as_select())
            .first(conn)
            .optional()
            .map_err(Into::into)
    }

    pub fn delete_by_hash(conn: &mut PgConnection, hash: &str) -> Result<(), RepositoryError> {
        diesel::delete(user_tokens::table.find(hash)).execute(conn)?;
        Ok(())
    }
}
