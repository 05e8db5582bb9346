
use course_core::model::{Course, CourseId, Deck, DeckDraft, DeckId, Lesson, LessonId};
use storage::repository::{CourseRepository, DeckRepository, LessonRepository, StorageError};
use tracing::{info, instrument};

use crate::Clock;
use crate::content::CourseContent;
use crate::error::ServiceError;

/// Fields of a lesson as an author submits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub order: i64,
    pub title: String,
    pub description: String,
    pub body: String,
}

/// Orchestrates creation of courses, lessons and decks.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    content: CourseContent,
}

impl CatalogService {
    #[must_use]
    pub fn new(clock: Clock, content: CourseContent) -> Self {
        Self { clock, content }
    }

    fn courses(&self) -> &dyn CourseRepository {
        self.content.courses.as_ref()
    }

    fn lessons(&self) -> &dyn LessonRepository {
        self.content.lessons.as_ref()
    }

    fn decks(&self) -> &dyn DeckRepository {
        self.content.decks.as_ref()
    }

    /// # Errors
    ///
    /// Returns `ServiceError::InvalidArgument` for blank fields.
    #[instrument(skip(self, title, description))]
    pub async fn create_course(
        &self,
        order: i64,
        title: String,
        description: String,
    ) -> Result<Course, ServiceError> {
        let course = Course::new(CourseId::generate(), order, title, description, self.clock.now())?;
        self.courses().insert_course(&course).await?;
        info!(course_id = %course.id(), "course created");
        Ok(course)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the course does not exist.
    pub async fn get_course(&self, course_id: CourseId) -> Result<Course, ServiceError> {
        self.content.course(course_id).await
    }

    /// Adds a lesson to a course. Every deck the body references must exist.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown course,
    /// `ServiceError::InvalidArgument` for invalid fields or unknown decks, and
    /// `ServiceError::Conflict` if the order is already used in the course.
    #[instrument(skip(self, draft), fields(%course_id, order = draft.order))]
    pub async fn create_lesson(
        &self,
        course_id: CourseId,
        draft: LessonDraft,
    ) -> Result<Lesson, ServiceError> {
        self.content.course(course_id).await?;
        let lesson = Lesson::new(
            LessonId::generate(),
            course_id,
            draft.order,
            draft.title,
            draft.description,
            draft.body,
            self.clock.now(),
        )?;

        let found = self.decks().get_decks(lesson.deck_ids()).await?;
        if let Some(unknown) = lesson
            .deck_ids()
            .iter()
            .find(|id| !found.iter().any(|d| d.id() == **id))
        {
            return Err(ServiceError::invalid(format!(
                "lesson references unknown deck {unknown}"
            )));
        }

        match self.lessons().insert_lesson(&lesson).await {
            Ok(()) => {
                info!(lesson_id = %lesson.id(), "lesson created");
                Ok(lesson)
            }
            Err(StorageError::Conflict) => Err(ServiceError::Conflict(format!(
                "course already has a lesson with order {}",
                lesson.order()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `ServiceError::InvalidArgument` if the deck or its cards are
    /// invalid.
    #[instrument(skip(self, draft), fields(cards = draft.cards.len()))]
    pub async fn create_deck(&self, draft: DeckDraft) -> Result<Deck, ServiceError> {
        let deck = draft.into_deck()?;
        self.decks().insert_deck(&deck).await?;
        info!(deck_id = %deck.id(), "deck created");
        Ok(deck)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the deck does not exist.
    pub async fn get_deck(&self, deck_id: DeckId) -> Result<Deck, ServiceError> {
        self.content.deck(deck_id).await
    }
}
