use std::sync::Arc;

use course_core::model::{CourseId, LearnerId, Lesson, LessonProjection};
use course_core::pagination::{Connection, CursorScope, PageRequest};
use storage::repository::ProgressRepository;
use tracing::instrument;

use crate::content::{CourseContent, current_lesson};
use crate::error::ServiceError;
use crate::paging::PageEngine;

/// A lesson annotated for one learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusedLesson {
    pub lesson: Lesson,
    pub is_completed: bool,
    pub is_current: bool,
}

/// Pages through the lessons of a course, plain or focused on a learner.
#[derive(Clone)]
pub struct LessonBrowser {
    content: CourseContent,
    progress: Arc<dyn ProgressRepository>,
    engine: PageEngine,
}

impl LessonBrowser {
    #[must_use]
    pub fn new(
        content: CourseContent,
        progress: Arc<dyn ProgressRepository>,
        engine: PageEngine,
    ) -> Self {
        Self {
            content,
            progress,
            engine,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown course, and paging
    /// errors from [`PageEngine::page`].
    #[instrument(skip(self, request), fields(%course_id))]
    pub async fn list(
        &self,
        course_id: CourseId,
        request: &PageRequest,
        projection: LessonProjection,
    ) -> Result<Connection<Lesson>, ServiceError> {
        self.content.course(course_id).await?;
        let lessons = &self.content.lessons;
        self.engine
            .page(CursorScope::Lessons(course_id), request, |slice| async move {
                lessons.lessons_slice(course_id, &slice, projection).await
            })
            .await
    }

    /// Same page as [`Self::list`], with completion and the current lesson
    /// marked for `learner_id`.
    ///
    /// The current lesson is derived from the whole course, so across pages
    /// at most one lesson is ever current.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list`].
    #[instrument(skip(self, request), fields(%learner_id, %course_id))]
    pub async fn focused(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        request: &PageRequest,
        projection: LessonProjection,
    ) -> Result<Connection<FocusedLesson>, ServiceError> {
        let page = self.list(course_id, request, projection).await?;
        let ordered = self.content.lesson_order(course_id).await?;
        let record = self.progress.get_progress(learner_id, course_id).await?;

        let current = current_lesson(&ordered, record.as_ref());
        Ok(page.map(|lesson| {
            let is_completed = record
                .as_ref()
                .is_some_and(|r| r.state.is_lesson_completed(lesson.id()));
            FocusedLesson {
                is_current: current == Some(lesson.id()),
                is_completed,
                lesson,
            }
        }))
    }
}
