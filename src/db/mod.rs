//! Database module for the library events service
//!
//! This module provides database connectivity, connection pooling,
//! and the event store used by the consumer pipeline.

pub mod library_event_repo;
pub mod pool;
pub mod repository;

// Re-export commonly used types
pub use library_event_repo::{LibraryEventRepository, PgLibraryEventRepository};
pub use pool::{create_pool, DbPool};
pub use repository::{Repository, RepositoryError, RepositoryResult, UpsertRepository};

use sqlx::migrate::Migrator;

/// Database migrator for running schema migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}
