pub mod connection;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repositories;
pub mod repository;
pub mod schema;

use diesel::PgConnection;
use diesel::r2d2::{self, ConnectionManager};

pub use repository::Repository;

pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;
