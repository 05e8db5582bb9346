use course_core::model::{CourseId, EnrolledCourse, LearnerId, ProgressRecord};
use course_core::pagination::{Slice, SliceRequest};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, keyset, limit_to_i64, map_course_row, map_current_lesson, map_progress_row, ser,
};
use crate::repository::{ProgressRepository, StorageError};

const ENROLLED_COLUMNS: &str =
    r#"c.id, c."order", c.title, c.description, c.created_at, p.current_lesson_id"#;

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT learner_id, course_id, state, current_lesson_id, version, created_at, updated_at
            FROM progress
            WHERE learner_id = ?1 AND course_id = ?2
            ",
        )
        .bind(learner_id.to_string())
        .bind(course_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn insert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let state = serde_json::to_string(&record.state).map_err(ser)?;

        sqlx::query(
            r"
            INSERT INTO progress (learner_id, course_id, state, current_lesson_id, version, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(record.learner_id.to_string())
        .bind(record.course_id.to_string())
        .bind(state)
        .bind(record.current_lesson_id.map(|id| id.to_string()))
        .bind(record.version)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn update_progress(
        &self,
        record: &ProgressRecord,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        let state = serde_json::to_string(&record.state).map_err(ser)?;
        let learner = record.learner_id.to_string();
        let course = record.course_id.to_string();

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            UPDATE progress
            SET state = ?1, current_lesson_id = ?2, version = ?3, updated_at = ?4
            WHERE learner_id = ?5 AND course_id = ?6 AND version = ?7
            ",
        )
        .bind(state)
        .bind(record.current_lesson_id.map(|id| id.to_string()))
        .bind(record.version)
        .bind(record.updated_at)
        .bind(learner.as_str())
        .bind(course.as_str())
        .bind(expected_version)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM progress WHERE learner_id = ?1 AND course_id = ?2")
                .bind(learner.as_str())
                .bind(course.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(conn)?
                .is_some();
            tx.rollback().await.map_err(conn)?;
            return Err(if exists {
                StorageError::Conflict
            } else {
                StorageError::NotFound
            });
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn enrolled_slice(
        &self,
        learner_id: LearnerId,
        request: &SliceRequest,
    ) -> Result<Slice<EnrolledCourse>, StorageError> {
        let ks = keyset(request.direction, r#"c."order""#, "c.id");
        let learner = learner_id.to_string();
        let limit = limit_to_i64(request.limit)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;

        let rows = match request.anchor {
            None => {
                let sql = format!(
                    "SELECT {ENROLLED_COLUMNS} FROM progress p JOIN courses c ON c.id = p.course_id \
                     WHERE p.learner_id = ? ORDER BY {} LIMIT ?",
                    ks.order_by
                );
                sqlx::query(&sql)
                    .bind(learner.as_str())
                    .bind(limit)
                    .fetch_all(&mut *tx)
                    .await
                    .map_err(conn)?
            }
            Some(anchor) => {
                let sql = format!(
                    "SELECT {ENROLLED_COLUMNS} FROM progress p JOIN courses c ON c.id = p.course_id \
                     WHERE p.learner_id = ? AND {} ORDER BY {} LIMIT ?",
                    ks.admit, ks.order_by
                );
                sqlx::query(&sql)
                    .bind(learner.as_str())
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
                    "SELECT \
                     EXISTS(SELECT 1 FROM progress p JOIN courses c ON c.id = p.course_id \
                            WHERE p.learner_id = ? AND {}) AS behind, \
                     EXISTS(SELECT 1 FROM progress p JOIN courses c ON c.id = p.course_id \
                            WHERE p.learner_id = ? AND {}) AS found",
                    ks.behind, ks.at
                );
                let row = sqlx::query(&sql)
                    .bind(learner.as_str())
                    .bind(anchor.order)
                    .bind(anchor.id.to_string())
                    .bind(learner.as_str())
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
            items.push(EnrolledCourse {
                course: map_course_row(&row)?,
                current_lesson_id: map_current_lesson(&row)?,
            });
        }
        Ok(Slice {
            items,
            has_behind,
            anchor_found,
        })
    }
}
