use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{
    CourseRepository, DeckRepository, LessonRepository, ProgressRepository, Storage,
};

mod course_repo;
mod deck_repo;
mod lesson_repo;
mod mapping;
mod migrate;
mod progress_repo;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Every repository trait over one connection pool.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Opens a pool on `database_url` with foreign keys enforced.
    ///
    /// Progress writes race on the same row, so connections wait on the
    /// database lock instead of failing with `SQLITE_BUSY`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is malformed or the first
    /// connection cannot be opened.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(BUSY_TIMEOUT)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Applies pending schema versions.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a migration statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        tracing::info!(database_url, "sqlite storage ready");
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let lessons: Arc<dyn LessonRepository> = Arc::new(repo.clone());
        let decks: Arc<dyn DeckRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Ok(Self {
            courses,
            lessons,
            decks,
            progress,
        })
    }
}
