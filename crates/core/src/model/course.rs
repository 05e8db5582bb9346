use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId};
use crate::pagination::{Keyed, Position};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("course description cannot be empty")]
    EmptyDescription,
}

/// A course groups an ordered collection of lessons.
///
/// `order` positions the course among the courses a learner is enrolled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    id: CourseId,
    order: i64,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
}

impl Course {
    /// Creates a validated course.
    ///
    /// Title and description are trimmed.
    ///
    /// # Errors
    ///
    /// Returns `CourseError` if the title or description is blank.
    pub fn new(
        id: CourseId,
        order: i64,
        title: impl Into<String>,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        let description = description.into().trim().to_owned();
        if description.is_empty() {
            return Err(CourseError::EmptyDescription);
        }

        Ok(Self {
            id,
            order,
            title,
            description,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn order(&self) -> i64 {
        self.order
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Keyed for Course {
    fn position(&self) -> Position {
        Position::new(self.order, self.id.value())
    }
}

/// A course as seen from a learner's enrollment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrolledCourse {
    pub course: Course,
    pub current_lesson_id: Option<LessonId>,
}

impl Keyed for EnrolledCourse {
    fn position(&self) -> Position {
        self.course.position()
    }
}
