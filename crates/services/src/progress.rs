use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::model::{
    AnswerId, CardId, CourseId, CourseOutline, DeckId, LearnerId, LessonId, LessonProgress,
    ProgressRecord,
};
use serde::{Deserialize, Serialize};
use storage::repository::{ProgressRepository, StorageError};
use tracing::{instrument, warn};

use crate::Clock;
use crate::content::CourseContent;
use crate::error::ServiceError;
use crate::locks::KeyedLocks;

/// How many times a progress write is re-read and retried after losing a
/// compare-and-set race.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

pub(crate) type ProgressLocks = KeyedLocks<(LearnerId, CourseId)>;

/// One answer picked by the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSubmission {
    pub card_id: CardId,
    pub answer_id: AnswerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    /// False when at least one submitted answer was incorrect.
    pub success: bool,
}

/// Records answers and serves per-learner completion state.
#[derive(Clone)]
pub struct ProgressTracker {
    clock: Clock,
    content: CourseContent,
    progress: Arc<dyn ProgressRepository>,
    locks: Arc<ProgressLocks>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(
        clock: Clock,
        content: CourseContent,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self::with_locks(clock, content, progress, Arc::new(KeyedLocks::new()))
    }

    pub(crate) fn with_locks(
        clock: Clock,
        content: CourseContent,
        progress: Arc<dyn ProgressRepository>,
        locks: Arc<ProgressLocks>,
    ) -> Self {
        Self {
            clock,
            content,
            progress,
            locks,
        }
    }

    /// Applies a batch of answers for cards of one deck in one lesson.
    ///
    /// Every submission is checked against the content before anything is
    /// written; the whole batch then lands in a single progress write.
    /// Progress is created on the fly for learners who never enrolled.
    /// Unknown answer ids count as incorrect.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidArgument` for an empty batch,
    /// `ServiceError::NotFound` when the course, lesson, deck (as referenced by
    /// the lesson) or any card does not exist, and storage errors.
    #[instrument(skip(self, submissions), fields(%learner_id, %course_id, %lesson_id, %deck_id, answers = submissions.len()))]
    pub async fn record_answers(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
        deck_id: DeckId,
        submissions: &[AnswerSubmission],
    ) -> Result<AnswerOutcome, ServiceError> {
        if submissions.is_empty() {
            return Err(ServiceError::invalid("no answers submitted"));
        }
        self.content.course(course_id).await?;
        let lesson = self.content.lesson(course_id, lesson_id).await?;
        if !lesson.references_deck(deck_id) {
            return Err(ServiceError::not_found("deck"));
        }
        let deck = self.content.deck(deck_id).await?;

        let mut graded = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let card = deck
                .card(submission.card_id)
                .ok_or_else(|| ServiceError::not_found("card"))?;
            graded.push((card.id, card.is_correct(submission.answer_id)));
        }

        let _guard = self.locks.lock((learner_id, course_id)).await;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let now = self.clock.now();
            let outline = self.content.outline(course_id).await?;
            let mut record = match self.progress.get_progress(learner_id, course_id).await? {
                Some(record) => record,
                None => ProgressRecord::enroll(learner_id, &outline, now),
            };

            record.state.sync(&outline, now);
            for (card_id, correct) in &graded {
                record
                    .state
                    .answer_card(lesson_id, deck_id, *card_id, *correct, now)?;
            }
            record.refresh_current(&outline);

            match write_progress(self.progress.as_ref(), &mut record, now).await {
                Ok(()) => break,
                Err(StorageError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(attempt, "progress write lost a race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(AnswerOutcome {
            success: graded.iter().all(|(_, correct)| *correct),
        })
    }

    /// Completion state of one lesson for a learner.
    ///
    /// Before enrollment, or for lessons added since, this is the blank state
    /// derived from the current content.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the course or lesson does not exist.
    #[instrument(skip(self), fields(%learner_id, %course_id, %lesson_id))]
    pub async fn lesson_state(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<LessonProgress, ServiceError> {
        self.content.course(course_id).await?;
        self.content.lesson(course_id, lesson_id).await?;
        let outline = self.content.outline(course_id).await?;
        let record = self.progress.get_progress(learner_id, course_id).await?;
        lesson_view(&outline, record.as_ref(), lesson_id)
            .ok_or_else(|| ServiceError::not_found("lesson"))
    }

    /// Completion state of every lesson of a course for a learner.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` if the course does not exist.
    #[instrument(skip(self), fields(%learner_id, %course_id))]
    pub async fn course_state(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<BTreeMap<LessonId, LessonProgress>, ServiceError> {
        self.content.course(course_id).await?;
        let outline = self.content.outline(course_id).await?;
        let record = self.progress.get_progress(learner_id, course_id).await?;
        Ok(outline
            .lesson_ids()
            .filter_map(|id| lesson_view(&outline, record.as_ref(), id).map(|p| (id, p)))
            .collect())
    }
}

fn lesson_view(
    outline: &CourseOutline,
    record: Option<&ProgressRecord>,
    lesson_id: LessonId,
) -> Option<LessonProgress> {
    record
        .and_then(|r| r.state.lesson(lesson_id).cloned())
        .or_else(|| outline.lesson(lesson_id).map(LessonProgress::blank))
}

/// Inserts a fresh record or compare-and-sets an existing one, bumping the
/// version either way.
pub(crate) async fn write_progress(
    repo: &dyn ProgressRepository,
    record: &mut ProgressRecord,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    let expected = record.version;
    let mut next = record.clone();
    next.version = expected + 1;
    next.updated_at = now;
    if expected == 0 {
        repo.insert_progress(&next).await?;
    } else {
        repo.update_progress(&next, expected).await?;
    }
    *record = next;
    Ok(())
}
