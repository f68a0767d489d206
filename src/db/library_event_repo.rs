//! Library event repository implementation
//!
//! This module provides the PostgreSQL implementation of the event store.
//! Each row holds one library event together with the book it owns; the
//! book's natural key is unique across rows.

use async_trait::async_trait;
use sqlx::Row;

use crate::{
    db::{
        repository::{Repository, RepositoryError, RepositoryResult, UpsertRepository},
        DbPool,
    },
    models::{Book, LibraryEvent, LibraryEventType},
};

/// Library event repository trait
///
/// The pipeline only needs `upsert` and `find_by_id`; `find_all` exists for
/// inspection and tests.
#[async_trait]
pub trait LibraryEventRepository:
    Repository<Entity = LibraryEvent, Id = i32> + UpsertRepository
{
    /// List every stored event ordered by identifier
    async fn find_all(&self) -> RepositoryResult<Vec<LibraryEvent>>;
}

/// PostgreSQL implementation of LibraryEventRepository
pub struct PgLibraryEventRepository {
    pool: DbPool,
}

impl PgLibraryEventRepository {
    /// Create a new PostgreSQL library event repository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Convert a database row to LibraryEvent
    fn row_to_event(row: &sqlx::postgres::PgRow) -> RepositoryResult<LibraryEvent> {
        let event_type: String = row.try_get("library_event_type")?;

        Ok(LibraryEvent {
            id: Some(row.try_get("library_event_id")?),
            event_type: LibraryEventType::from_db(&event_type),
            book: Book {
                book_id: row.try_get("book_id")?,
                book_name: row.try_get("book_name")?,
                book_author: row.try_get("book_author")?,
            },
        })
    }

    /// Map a unique violation onto the conflict variant
    fn map_write_error(err: sqlx::Error, book_id: i32) -> RepositoryError {
        let err = RepositoryError::Database(err);
        if err.is_conflict() {
            RepositoryError::Conflict(format!("book {} is already owned by another event", book_id))
        } else {
            err
        }
    }
}

#[async_trait]
impl Repository for PgLibraryEventRepository {
    type Entity = LibraryEvent;
    type Id = i32;

    async fn find_by_id(&self, id: i32) -> RepositoryResult<Option<LibraryEvent>> {
        let row = sqlx::query(
            r#"
            SELECT library_event_id, library_event_type, book_id, book_name, book_author
            FROM library_events
            WHERE library_event_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_event).transpose()
    }

    async fn count(&self) -> RepositoryResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM library_events")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn health_check(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| RepositoryError::Connection(format!("Health check failed: {}", e)))
    }
}

#[async_trait]
impl UpsertRepository for PgLibraryEventRepository {
    async fn upsert(&self, entity: &LibraryEvent) -> RepositoryResult<LibraryEvent> {
        let book = &entity.book;

        let row = match entity.id {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO library_events (library_event_type, book_id, book_name, book_author)
                    VALUES ($1, $2, $3, $4)
                    RETURNING library_event_id, library_event_type, book_id, book_name, book_author
                    "#,
                )
                .bind(entity.event_type.as_str())
                .bind(book.book_id)
                .bind(&book.book_name)
                .bind(&book.book_author)
                .fetch_one(&self.pool)
                .await
            },
            Some(id) => {
                sqlx::query(
                    r#"
                    INSERT INTO library_events (
                        library_event_id, library_event_type, book_id, book_name, book_author
                    ) VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (library_event_id) DO UPDATE SET
                        library_event_type = EXCLUDED.library_event_type,
                        book_id = EXCLUDED.book_id,
                        book_name = EXCLUDED.book_name,
                        book_author = EXCLUDED.book_author
                    RETURNING library_event_id, library_event_type, book_id, book_name, book_author
                    "#,
                )
                .bind(id)
                .bind(entity.event_type.as_str())
                .bind(book.book_id)
                .bind(&book.book_name)
                .bind(&book.book_author)
                .fetch_one(&self.pool)
                .await
            },
        }
        .map_err(|e| Self::map_write_error(e, book.book_id))?;

        Self::row_to_event(&row)
    }
}

#[async_trait]
impl LibraryEventRepository for PgLibraryEventRepository {
    async fn find_all(&self) -> RepositoryResult<Vec<LibraryEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT library_event_id, library_event_type, book_id, book_name, book_author
            FROM library_events
            ORDER BY library_event_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_event).collect()
    }
}
