use crate::db::error::RepositoryError;
use crate::db::models::session::{NewSession, Session};
use crate::db::schema::user_sessions;
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

pub struct SessionRepository;

impl SessionRepository {
    pub fn create(
        conn: &mut PgConnection,
        new_session: &NewSession<'_>,
    ) -> Result<Session, RepositoryError> {
        diesel::insert_into(user_sessions::table)
            .values(new_session)
            .returning(Session::as_returning())
            .get_result(conn)
            .map_err(Into::into)
    }

    pub fn find_by_token_hash(
        conn: &mut PgConnection,
        hash: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        user_sessions::table
            .filter(user_sessions::token_hash.eq(hash))
            .filter(user_sessions::expires_at.gt(Utc::now()))
            .select(Session::as_select())
            .first(conn)
            .optional()
            .map_err(Into::into)
    }

    pub fn delete_by_token_hash(conn: &mut PgConnection, hash: &str) -> Result<(), RepositoryError> {
        diesel::delete(user_sessions::table.filter(user_sessions::token_hash.eq(hash)))
            .execute(conn)?;
        Ok(())
    }

    pub fn delete_by_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), RepositoryError> {
        diesel::delete(user_sessions::table.filter(user_sessions::user_id.eq(user_id)))
            .execute(conn)?;
        Ok(())
    }
}
