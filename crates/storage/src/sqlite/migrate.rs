use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r#"
        CREATE TABLE IF NOT EXISTS courses (
            id TEXT PRIMARY KEY,
            "order" INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
    "#,
    r#"
        CREATE INDEX IF NOT EXISTS idx_courses_order_id
            ON courses ("order", id);
    "#,
    r#"
        CREATE TABLE IF NOT EXISTS lessons (
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            "order" INTEGER NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            body TEXT NOT NULL,
            deck_ids TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (course_id, "order"),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    "#,
    r#"
        CREATE INDEX IF NOT EXISTS idx_lessons_course_order_id
            ON lessons (course_id, "order", id);
    "#,
    r"
        CREATE TABLE IF NOT EXISTS decks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            cards TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS progress (
            learner_id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            state TEXT NOT NULL,
            current_lesson_id TEXT,
            version INTEGER NOT NULL CHECK (version >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (learner_id, course_id),
            FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
        );
    ",
];

/// Applies pending schema versions, each in its own transaction.
///
/// Version 1 creates courses, lessons (unique order per course), decks with
/// their cards as JSON, and per-learner progress.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
