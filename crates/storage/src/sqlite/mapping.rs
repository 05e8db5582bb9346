use chrono::{DateTime, Utc};
use course_core::model::{
    Card, Course, CourseId, Deck, DeckId, LearnerId, Lesson, LessonId, ProgressRecord,
    ProgressState,
};
use course_core::pagination::Direction;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors, turning constraint violations into `Conflict`.
pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        _ => StorageError::Connection(e.to_string()),
    }
}

fn uuid_from_text(field: &'static str, raw: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(raw).map_err(|_| StorageError::Serialization(format!("invalid {field}: {raw}")))
}

fn text_uuid(row: &SqliteRow, field: &'static str) -> Result<Uuid, StorageError> {
    let raw: String = row.try_get(field).map_err(ser)?;
    uuid_from_text(field, &raw)
}

pub(crate) fn limit_to_i64(limit: usize) -> Result<i64, StorageError> {
    i64::try_from(limit).map_err(|_| StorageError::Serialization("limit overflow".into()))
}

/// SQL fragments for a keyset page over `(order_col, id_col)`.
pub(crate) struct Keyset {
    /// Rows strictly past the anchor; binds `(order, id)`.
    pub admit: String,
    /// Rows at or behind the anchor; binds `(order, id)`.
    pub behind: String,
    /// The anchor row itself; binds `(order, id)`.
    pub at: String,
    /// Nearest-first ordering.
    pub order_by: String,
}

pub(crate) fn keyset(direction: Direction, order_col: &str, id_col: &str) -> Keyset {
    let (admit, behind, sort) = match direction {
        Direction::Forward => (">", "<=", "ASC"),
        Direction::Backward => ("<", ">=", "DESC"),
    };
    Keyset {
        admit: format!("({order_col}, {id_col}) {admit} (?, ?)"),
        behind: format!("({order_col}, {id_col}) {behind} (?, ?)"),
        at: format!("({order_col}, {id_col}) = (?, ?)"),
        order_by: format!("{order_col} {sort}, {id_col} {sort}"),
    }
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    Course::new(
        CourseId::new(text_uuid(row, "id")?),
        row.try_get::<i64, _>("order").map_err(ser)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
        row.try_get::<DateTime<Utc>, _>("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_lesson_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let deck_ids: Vec<DeckId> =
        serde_json::from_str(&row.try_get::<String, _>("deck_ids").map_err(ser)?).map_err(ser)?;
    Ok(Lesson::from_persisted(
        LessonId::new(text_uuid(row, "id")?),
        CourseId::new(text_uuid(row, "course_id")?),
        row.try_get::<i64, _>("order").map_err(ser)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
        row.try_get::<Option<String>, _>("body").map_err(ser)?,
        deck_ids,
        row.try_get::<DateTime<Utc>, _>("created_at").map_err(ser)?,
    ))
}

pub(crate) fn map_deck_row(row: &SqliteRow) -> Result<Deck, StorageError> {
    let cards: Vec<Card> =
        serde_json::from_str(&row.try_get::<String, _>("cards").map_err(ser)?).map_err(ser)?;
    Deck::new(
        DeckId::new(text_uuid(row, "id")?),
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("description").map_err(ser)?,
        cards,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let state: ProgressState =
        serde_json::from_str(&row.try_get::<String, _>("state").map_err(ser)?).map_err(ser)?;
    let current_lesson_id = map_current_lesson(row)?;
    Ok(ProgressRecord {
        learner_id: LearnerId::new(text_uuid(row, "learner_id")?),
        course_id: CourseId::new(text_uuid(row, "course_id")?),
        state,
        current_lesson_id,
        version: row.try_get("version").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}

pub(crate) fn map_current_lesson(row: &SqliteRow) -> Result<Option<LessonId>, StorageError> {
    row.try_get::<Option<String>, _>("current_lesson_id")
        .map_err(ser)?
        .map(|raw| uuid_from_text("current_lesson_id", &raw).map(LessonId::new))
        .transpose()
}
