use crate::db::error::RepositoryError;
use crate::db::models::user::{NewUser, User};
use crate::db::schema::{oauth_identities, users};
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

pub struct UserRepository;

impl UserRepository {
    pub fn find_by_email(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(conn)
            .optional()
            .map_err(Into::into)
    }

    /// Trouver un utilisateur par ID
    pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<User>, RepositoryError> {
        users::table
            .find(id)
            .select(User::as_select())
            .first(conn)
            .optional()
            .map_err(Into::into)
    }

    /// Trouver l'utilisateur lié à une identité OAuth
    pub fn find_by_oauth_identity(
        conn: &mut PgConnection,
        provider: &str,
        provider_user_id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        users::table
            .inner_join(oauth_identities::table)
            .filter(oauth_identities::provider_name.eq(provider))
            .filter(oauth_identities::provider_user_id.eq(provider_user_id))
            .select(User::as_select())
            .first(conn)
            .optional()
            .map_err(Into::into)
    }

    /// Créer un nouvel utilisateur
    pub fn create(conn: &mut PgConnection, new_user: &NewUser<'_>) -> Result<User, RepositoryError> {
        diesel::insert_into(users::table)
            .values(new_user)
            .returning(User::as_returning())
            .get_result(conn)
            .map_err(Into::into)
    }

    /// Mettre à jour le dernier login
    pub fn update_last_login(conn: &mut PgConnection, id: Uuid) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let updated = diesel::update(users::table.find(id))
            .set((
                users::last_login_at.eq(Some(now)),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;
        ensure_updated(updated, id)
    }

    pub fn mark_email_verified(conn: &mut PgConnection, id: Uuid) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let updated = diesel::update(users::table.find(id))
            .set((
                users::email_verified_at.eq(Some(now)),
                users::updated_at.eq(now),
            ))
            .execute(conn)?;
        ensure_updated(updated, id)
    }

    // Mettre à jour le mot de passe
    pub fn update_password(
        conn: &mut PgConnection,
        id: Uuid,
        new_password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let updated = diesel::update(users::table.find(id))
            .set((
                users::password_hash.eq(new_password_hash),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        ensure_updated(updated, id)
    }
}

fn ensure_updated(rows: usize, id: Uuid) -> Result<(), RepositoryError> {
    if rows == 0 {
        return Err(RepositoryError::NotFound(format!("user {id}")));
    }
    Ok(())
}
