use course_core::model::{Course, CourseId};

use super::SqliteRepository;
use super::mapping::{conn, map_course_row};
use crate::repository::{CourseRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn insert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO courses (id, "order", title, description, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(course.id().to_string())
        .bind(course.order())
        .bind(course.title())
        .bind(course.description())
        .bind(course.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT id, "order", title, description, created_at
            FROM courses WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        match row {
            Some(row) => map_course_row(&row),
            None => Err(StorageError::NotFound),
        }
    }
}
