use course_core::model::{CourseId, Lesson, LessonId, LessonProjection};
use course_core::pagination::{Slice, SliceRequest};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, keyset, limit_to_i64, map_lesson_row, ser};
use crate::repository::{LessonRepository, StorageError};

fn columns(projection: LessonProjection) -> &'static str {
    if projection.includes_body() {
        r#"id, course_id, "order", title, description, body, deck_ids, created_at"#
    } else {
        r#"id, course_id, "order", title, description, NULL AS body, deck_ids, created_at"#
    }
}

#[async_trait::async_trait]
impl LessonRepository for SqliteRepository {
    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let body = lesson
            .body()
            .ok_or_else(|| StorageError::Serialization("lesson body is missing".into()))?;
        let deck_ids = serde_json::to_string(lesson.deck_ids()).map_err(ser)?;

        sqlx::query(
            r#"
            INSERT INTO lessons (id, course_id, "order", title, description, body, deck_ids, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(lesson.id().to_string())
        .bind(lesson.course_id().to_string())
        .bind(lesson.order())
        .bind(lesson.title())
        .bind(lesson.description())
        .bind(body)
        .bind(deck_ids)
        .bind(lesson.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_lesson(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Lesson, StorageError> {
        let sql = format!(
            "SELECT {} FROM lessons WHERE id = ?1 AND course_id = ?2",
            columns(LessonProjection::Full)
        );
        let row = sqlx::query(&sql)
            .bind(lesson_id.to_string())
            .bind(course_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        match row {
            Some(row) => map_lesson_row(&row),
            None => Err(StorageError::NotFound),
        }
    }

    async fn lessons_slice(
        &self,
        course_id: CourseId,
        request: &SliceRequest,
        projection: LessonProjection,
    ) -> Result<Slice<Lesson>, StorageError> {
        let ks = keyset(request.direction, r#""order""#, "id");
        let course = course_id.to_string();
        let limit = limit_to_i64(request.limit)?;

        // Page rows, the boundary check and the anchor check share one read
        // transaction.
        let mut tx = self.pool.begin().await.map_err(conn)?;

        let rows = match request.anchor {
            None => {
                let sql = format!(
                    "SELECT {} FROM lessons WHERE course_id = ? ORDER BY {} LIMIT ?",
                    columns(projection),
                    ks.order_by
                );
                sqlx::query(&sql)
                    .bind(course.as_str())
                    .bind(limit)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(conn)?
            }
            Some(anchor) => {
                let sql = format!(
                    "SELECT {} FROM lessons WHERE course_id = ? AND {} ORDER BY {} LIMIT ?",
                    columns(projection),
                    ks.admit,
                    ks.order_by
                );
                sqlx::query(&sql)
                    .bind(course.as_str())
                    .bind(anchor.order)
                    .bind(anchor.id.to_string())
                    .bind(limit)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(conn)?
            }
        };

        let (has_behind, anchor_found) = match request.anchor {
            None => (false, false),
            Some(anchor) => {
                let sql = format!(
                    "SELECT EXISTS(SELECT 1 FROM lessons WHERE course_id = ? AND {}) AS behind, \
                     EXISTS(SELECT 1 FROM lessons WHERE course_id = ? AND {}) AS found",
                    ks.behind, ks.at
                );
                let row = sqlx::query(&sql)
                    .bind(course.as_str())
                    .bind(anchor.order)
                    .bind(anchor.id.to_string())
                    .bind(course.as_str())
                    .bind(anchor.order)
                    .bind(anchor.id.to_string())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(conn)?;
                (
                    row.try_get::<i64, _>("behind").map_err(ser)? != 0,
                    row.try_get::<i64, _>("found").map_err(ser)? != 0,
                )
            }
        };

        tx.commit().await.map_err(conn)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(map_lesson_row(&row)?);
        }
        Ok(Slice {
            items,
            has_behind,
            anchor_found,
        })
    }

    async fn all_lessons(
        &self,
        course_id: CourseId,
        projection: LessonProjection,
    ) -> Result<Vec<Lesson>, StorageError> {
        let sql = format!(
            r#"SELECT {} FROM lessons WHERE course_id = ?1 ORDER BY "order" ASC, id ASC"#,
            columns(projection)
        );
        let rows = sqlx::query(&sql)
            .bind(course_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        let mut lessons = Vec::with_capacity(rows.len());
        for row in rows {
            lessons.push(map_lesson_row(&row)?);
        }
        Ok(lessons)
    }
}
