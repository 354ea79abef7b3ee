use crate::db::error::RepositoryError;
use crate::db::models::oauth_identity::NewOAuthIdentity;
use crate::db::schema::oauth_identities;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;

pub struct OAuthIdentityRepository;

impl OAuthIdentityRepository {
    /// Insère l'identité, ou rafraîchit les tokens du provider si elle existe déjà.
    pub fn upsert(
        conn: &mut PgConnection,
        identity: &NewOAuthIdentity<'_>,
    ) -> Result<(), RepositoryError> {
        diesel::insert_into(oauth_identities::table)
            .values(identity)
            .on_conflict((
                oauth_identities::provider_name,
                oauth_identities::provider_user_id,
            ))
            .do_update()
            .set((
                oauth_identities::provider_access_token
                    .eq(excluded(oauth_identities::provider_access_token)),
                oauth_identities::provider_refresh_token
                    .eq(excluded(oauth_identities::provider_refresh_token)),
                oauth_identities::updated_at.eq(Utc::now()),
            ))
            .execute(conn)?;
        Ok(())
    }
}
