//! Database module
//!
//! Repository ports plus the in-memory and PostgreSQL adapters.

pub mod connection;
pub mod memory;
pub mod postgres;
pub mod repositories;

use sqlx::PgPool;

pub use connection::*;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
