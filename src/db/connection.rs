use super::DbPool;
use anyhow::{Context, Result};
use diesel::PgConnection;
use diesel::r2d2::ConnectionManager;
use std::time::Duration;

pub const DEFAULT_POOL_SIZE: u32 = 5;
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Construit le pool de connexions au démarrage.
/// Échoue rapidement si la base n'est pas joignable.
pub fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);

    diesel::r2d2::Pool::builder()
        .max_size(max_size)
        .connection_timeout(CONNECTION_TIMEOUT)
        .build(manager)
        .context("Failed to create database pool")
}
