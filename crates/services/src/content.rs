use std::collections::HashMap;
use std::sync::Arc;

use course_core::model::{
    Course, CourseId, CourseOutline, Deck, DeckId, Lesson, LessonId, LessonProjection,
    ProgressRecord,
};
use storage::repository::{CourseRepository, DeckRepository, LessonRepository};

use crate::error::{ServiceError, missing};

/// Read access to authored content shared by the learner-facing services.
#[derive(Clone)]
pub struct CourseContent {
    pub(crate) courses: Arc<dyn CourseRepository>,
    pub(crate) lessons: Arc<dyn LessonRepository>,
    pub(crate) decks: Arc<dyn DeckRepository>,
}

impl CourseContent {
    #[must_use]
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        lessons: Arc<dyn LessonRepository>,
        decks: Arc<dyn DeckRepository>,
    ) -> Self {
        Self {
            courses,
            lessons,
            decks,
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the course does not exist.
    pub async fn course(&self, course_id: CourseId) -> Result<Course, ServiceError> {
        self.courses
            .get_course(course_id)
            .await
            .map_err(missing("course"))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the lesson is not part of the course.
    pub async fn lesson(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Lesson, ServiceError> {
        self.lessons
            .get_lesson(course_id, lesson_id)
            .await
            .map_err(missing("lesson"))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the deck does not exist.
    pub async fn deck(&self, deck_id: DeckId) -> Result<Deck, ServiceError> {
        self.decks.get_deck(deck_id).await.map_err(missing("deck"))
    }

    /// Lesson ids of a course in `(order, id)` order.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn lesson_order(&self, course_id: CourseId) -> Result<Vec<LessonId>, ServiceError> {
        let lessons = self
            .lessons
            .all_lessons(course_id, LessonProjection::Bodyless)
            .await?;
        Ok(lessons.iter().map(Lesson::id).collect())
    }

    /// The lesson → deck → card skeleton of a course as it is stored now.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn outline(&self, course_id: CourseId) -> Result<CourseOutline, ServiceError> {
        let lessons = self
            .lessons
            .all_lessons(course_id, LessonProjection::Bodyless)
            .await?;

        let mut wanted: Vec<DeckId> = Vec::new();
        for id in lessons.iter().flat_map(|l| l.deck_ids().iter().copied()) {
            if !wanted.contains(&id) {
                wanted.push(id);
            }
        }
        let decks: HashMap<DeckId, Deck> = self
            .decks
            .get_decks(&wanted)
            .await?
            .into_iter()
            .map(|d| (d.id(), d))
            .collect();

        Ok(CourseOutline::from_lessons(course_id, &lessons, |id| {
            decks.get(&id)
        }))
    }
}

/// The lesson a learner should work on next, given the course's lessons in
/// order. Without progress the first lesson is current.
pub(crate) fn current_lesson(
    ordered: &[LessonId],
    record: Option<&ProgressRecord>,
) -> Option<LessonId> {
    record.map_or_else(
        || ordered.first().copied(),
        |record| record.state.current_lesson(ordered),
    )
}
