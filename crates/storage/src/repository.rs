use async_trait::async_trait;
use course_core::model::{
    Course, CourseId, Deck, DeckId, EnrolledCourse, LearnerId, Lesson, LessonId, LessonProjection,
    ProgressRecord,
};
use course_core::pagination::{Keyed, Slice, SliceRequest, slice_sorted};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository contract for courses.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist a new course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken, or other storage errors.
    async fn insert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Fetch a course by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError>;
}

/// Repository contract for the ordered lessons of a course.
#[async_trait]
pub trait LessonRepository: Send + Sync {
    /// Persist a new lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id or the `(course, order)` pair
    /// is taken, or other storage errors.
    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// Fetch one lesson of a course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson does not exist or belongs
    /// to another course.
    async fn get_lesson(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Lesson, StorageError>;

    /// Read a slice of a course's lessons from a single snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn lessons_slice(
        &self,
        course_id: CourseId,
        request: &SliceRequest,
        projection: LessonProjection,
    ) -> Result<Slice<Lesson>, StorageError>;

    /// Every lesson of a course, ascending by `(order, id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn all_lessons(
        &self,
        course_id: CourseId,
        projection: LessonProjection,
    ) -> Result<Vec<Lesson>, StorageError>;
}

/// Repository contract for decks and their cards.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Persist a new deck.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken, or other storage errors.
    async fn insert_deck(&self, deck: &Deck) -> Result<(), StorageError>;

    /// Fetch a deck by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_deck(&self, id: DeckId) -> Result<Deck, StorageError>;

    /// Fetch the decks that exist among `ids`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn get_decks(&self, ids: &[DeckId]) -> Result<Vec<Deck>, StorageError>;
}

/// Repository contract for learner progress.
///
/// Updates are compare-and-set on `ProgressRecord::version`.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn get_progress(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<ProgressRecord>, StorageError>;

    /// Persist a record that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the learner already has progress in
    /// the course.
    async fn insert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// Replace a record if its stored version is still `expected_version`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the version moved on, and
    /// `StorageError::NotFound` if there is no record.
    async fn update_progress(
        &self,
        record: &ProgressRecord,
        expected_version: i64,
    ) -> Result<(), StorageError>;

    /// Read a slice of the courses a learner is enrolled in.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn enrolled_slice(
        &self,
        learner_id: LearnerId,
        request: &SliceRequest,
    ) -> Result<Slice<EnrolledCourse>, StorageError>;
}

#[derive(Default)]
struct Tables {
    courses: HashMap<CourseId, Course>,
    lessons: HashMap<CourseId, Vec<Lesson>>,
    decks: HashMap<DeckId, Deck>,
    progress: HashMap<(LearnerId, CourseId), ProgressRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// All tables sit behind one lock so every call reads a single snapshot.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.courses.contains_key(&course.id()) {
            return Err(StorageError::Conflict);
        }
        guard.courses.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let guard = self.lock()?;
        guard.courses.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl LessonRepository for InMemoryRepository {
    async fn insert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let taken = guard
            .lessons
            .values()
            .flatten()
            .any(|l| l.id() == lesson.id())
            || guard
                .lessons
                .get(&lesson.course_id())
                .is_some_and(|ls| ls.iter().any(|l| l.order() == lesson.order()));
        if taken {
            return Err(StorageError::Conflict);
        }
        let lessons = guard.lessons.entry(lesson.course_id()).or_default();
        let at = lessons.partition_point(|l| l.position() < lesson.position());
        lessons.insert(at, lesson.clone());
        Ok(())
    }

    async fn get_lesson(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Lesson, StorageError> {
        let guard = self.lock()?;
        guard
            .lessons
            .get(&course_id)
            .and_then(|ls| ls.iter().find(|l| l.id() == lesson_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn lessons_slice(
        &self,
        course_id: CourseId,
        request: &SliceRequest,
        projection: LessonProjection,
    ) -> Result<Slice<Lesson>, StorageError> {
        let guard = self.lock()?;
        let slice = match guard.lessons.get(&course_id) {
            Some(lessons) => slice_sorted(lessons, request),
            None => Slice::empty(),
        };
        Ok(slice.map(|l| l.project(projection)))
    }

    async fn all_lessons(
        &self,
        course_id: CourseId,
        projection: LessonProjection,
    ) -> Result<Vec<Lesson>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .lessons
            .get(&course_id)
            .map(|ls| ls.iter().cloned().map(|l| l.project(projection)).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl DeckRepository for InMemoryRepository {
    async fn insert_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if guard.decks.contains_key(&deck.id()) {
            return Err(StorageError::Conflict);
        }
        guard.decks.insert(deck.id(), deck.clone());
        Ok(())
    }

    async fn get_deck(&self, id: DeckId) -> Result<Deck, StorageError> {
        let guard = self.lock()?;
        guard.decks.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn get_decks(&self, ids: &[DeckId]) -> Result<Vec<Deck>, StorageError> {
        let guard = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| guard.decks.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<ProgressRecord>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.progress.get(&(learner_id, course_id)).cloned())
    }

    async fn insert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let key = (record.learner_id, record.course_id);
        if guard.progress.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        guard.progress.insert(key, record.clone());
        Ok(())
    }

    async fn update_progress(
        &self,
        record: &ProgressRecord,
        expected_version: i64,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let stored = guard
            .progress
            .get_mut(&(record.learner_id, record.course_id))
            .ok_or(StorageError::NotFound)?;
        if stored.version != expected_version {
            return Err(StorageError::Conflict);
        }
        *stored = record.clone();
        Ok(())
    }

    async fn enrolled_slice(
        &self,
        learner_id: LearnerId,
        request: &SliceRequest,
    ) -> Result<Slice<EnrolledCourse>, StorageError> {
        let guard = self.lock()?;
        let mut enrolled: Vec<EnrolledCourse> = guard
            .progress
            .values()
            .filter(|p| p.learner_id == learner_id)
            .filter_map(|p| {
                guard.courses.get(&p.course_id).map(|c| EnrolledCourse {
                    course: c.clone(),
                    current_lesson_id: p.current_lesson_id,
                })
            })
            .collect();
        enrolled.sort_by_key(EnrolledCourse::position);
        Ok(slice_sorted(&enrolled, request))
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub lessons: Arc<dyn LessonRepository>,
    pub decks: Arc<dyn DeckRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            courses: Arc::new(repo.clone()),
            lessons: Arc::new(repo.clone()),
            decks: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{
        Answer, AnswerId, Card, CardId, CardKind, CourseOutline, DeckOutline, LessonOutline,
    };
    use course_core::pagination::Direction;
    use course_core::time::fixed_now;

    fn deck() -> Deck {
        let card = Card {
            id: CardId::generate(),
            title: "Q".into(),
            explanation: String::new(),
            kind: CardKind::SingleChoice,
            possible_answers: vec![Answer {
                id: AnswerId::generate(),
                text: "A".into(),
                is_correct: true,
            }],
        };
        Deck::new(DeckId::generate(), "Deck", "", vec![card]).unwrap()
    }

    fn lesson(course: CourseId, order: i64, deck: DeckId) -> Lesson {
        Lesson::new(
            LessonId::generate(),
            course,
            order,
            format!("Lesson {order}"),
            "desc",
            format!("![deck]({deck})"),
            fixed_now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn lessons_stay_sorted_and_order_is_unique() {
        let repo = InMemoryRepository::new();
        let course = CourseId::generate();
        let d = deck();
        for order in [3, 1, 2] {
            repo.insert_lesson(&lesson(course, order, d.id())).await.unwrap();
        }
        let dup = repo.insert_lesson(&lesson(course, 2, d.id())).await;
        assert!(matches!(dup, Err(StorageError::Conflict)));

        let all = repo.all_lessons(course, LessonProjection::Bodyless).await.unwrap();
        let orders: Vec<i64> = all.iter().map(Lesson::order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert!(all.iter().all(|l| l.body().is_none()));
    }

    #[tokio::test]
    async fn lesson_of_other_course_is_not_found() {
        let repo = InMemoryRepository::new();
        let d = deck();
        let l = lesson(CourseId::generate(), 1, d.id());
        repo.insert_lesson(&l).await.unwrap();
        let err = repo.get_lesson(CourseId::generate(), l.id()).await;
        assert!(matches!(err, Err(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn progress_update_is_compare_and_set() {
        let repo = InMemoryRepository::new();
        let d = deck();
        let course = CourseId::generate();
        let outline = CourseOutline::new(
            course,
            vec![LessonOutline {
                id: LessonId::generate(),
                order: 1,
                decks: vec![DeckOutline::from_deck(&d)],
            }],
        );
        let mut record = ProgressRecord::enroll(LearnerId::generate(), &outline, fixed_now());
        record.version = 1;
        repo.insert_progress(&record).await.unwrap();
        assert!(matches!(
            repo.insert_progress(&record).await,
            Err(StorageError::Conflict)
        ));

        let mut next = record.clone();
        next.version = 2;
        repo.update_progress(&next, 1).await.unwrap();
        assert!(matches!(
            repo.update_progress(&next, 1).await,
            Err(StorageError::Conflict)
        ));

        let stored = repo
            .get_progress(record.learner_id, course)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn enrolled_slice_only_lists_learner_courses() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::generate();
        for order in 0..3 {
            let course =
                Course::new(CourseId::generate(), order, "c", "d", fixed_now()).unwrap();
            repo.insert_course(&course).await.unwrap();
            if order != 1 {
                let outline = CourseOutline::new(course.id(), vec![]);
                let record = ProgressRecord::enroll(learner, &outline, fixed_now());
                repo.insert_progress(&record).await.unwrap();
            }
        }
        let req = SliceRequest {
            direction: Direction::Forward,
            anchor: None,
            limit: 10,
        };
        let slice = repo.enrolled_slice(learner, &req).await.unwrap();
        let orders: Vec<i64> = slice.items.iter().map(|e| e.course.order()).collect();
        assert_eq!(orders, vec![0, 2]);

        let other = repo.enrolled_slice(LearnerId::generate(), &req).await.unwrap();
        assert!(other.items.is_empty());
    }
}
