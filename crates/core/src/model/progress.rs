use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CardId, CourseId, DeckId, LearnerId, LessonId};
use crate::model::outline::{CourseOutline, DeckOutline, LessonOutline};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("lesson {0} is not tracked")]
    UntrackedLesson(LessonId),

    #[error("deck {deck} is not tracked in lesson {lesson}")]
    UntrackedDeck { lesson: LessonId, deck: DeckId },

    #[error("card {card} is not tracked in deck {deck}")]
    UntrackedCard { deck: DeckId, card: CardId },
}

//
// ─── NODES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardProgress {
    correct_answers: u32,
    incorrect_answers: u32,
    is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl CardProgress {
    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn incorrect_answers(&self) -> u32 {
        self.incorrect_answers
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Records one answer. Returns true when this answer completed the card.
    fn record(&mut self, correct: bool, now: DateTime<Utc>) -> bool {
        if !correct {
            self.incorrect_answers = self.incorrect_answers.saturating_add(1);
            return false;
        }
        self.correct_answers = self.correct_answers.saturating_add(1);
        if self.is_completed {
            return false;
        }
        self.is_completed = true;
        self.completed_at = Some(now);
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckProgress {
    cards: BTreeMap<CardId, CardProgress>,
    is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl DeckProgress {
    /// Blank progress for every card of a deck.
    #[must_use]
    pub fn blank(deck: &DeckOutline) -> Self {
        Self {
            cards: deck
                .cards
                .iter()
                .map(|id| (*id, CardProgress::default()))
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn cards(&self) -> &BTreeMap<CardId, CardProgress> {
        &self.cards
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Marks the deck complete once every tracked card is. Never reverts.
    fn settle(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_completed || self.cards.is_empty() {
            return false;
        }
        if self.cards.values().all(CardProgress::is_completed) {
            self.is_completed = true;
            self.completed_at = Some(now);
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgress {
    decks: BTreeMap<DeckId, DeckProgress>,
    is_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

impl LessonProgress {
    /// Blank progress for every deck and card a lesson references.
    #[must_use]
    pub fn blank(lesson: &LessonOutline) -> Self {
        Self {
            decks: lesson
                .decks
                .iter()
                .map(|d| (d.id, DeckProgress::blank(d)))
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn decks(&self) -> &BTreeMap<DeckId, DeckProgress> {
        &self.decks
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn settle(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_completed || self.decks.is_empty() {
            return false;
        }
        if self.decks.values().all(DeckProgress::is_completed) {
            self.is_completed = true;
            self.completed_at = Some(now);
            return true;
        }
        false
    }
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// What a single answer changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnswerEffect {
    pub card_completed: bool,
    pub deck_completed: bool,
    pub lesson_completed: bool,
}

/// Counts of structural changes made by [`ProgressState::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub pruned: usize,
    pub completed: usize,
}

impl SyncReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.pruned == 0 && self.completed == 0
    }
}

/// Per-learner, per-course completion tree.
///
/// Completion only ever goes from `false` to `true`. A completed lesson or
/// deck is frozen: content added to it later is not tracked, so a container
/// is complete exactly when every child it tracks is complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    lessons: BTreeMap<LessonId, LessonProgress>,
}

impl ProgressState {
    /// Fresh state tracking every lesson, deck and card of `outline`.
    #[must_use]
    pub fn from_outline(outline: &CourseOutline) -> Self {
        Self {
            lessons: outline
                .lessons()
                .iter()
                .map(|l| (l.id, LessonProgress::blank(l)))
                .collect(),
        }
    }

    #[must_use]
    pub fn lessons(&self) -> &BTreeMap<LessonId, LessonProgress> {
        &self.lessons
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: LessonId) -> Option<&LessonProgress> {
        self.lessons.get(&lesson_id)
    }

    /// Untracked lessons count as incomplete.
    #[must_use]
    pub fn is_lesson_completed(&self, lesson_id: LessonId) -> bool {
        self.lessons
            .get(&lesson_id)
            .is_some_and(LessonProgress::is_completed)
    }

    /// Records an answer for a tracked card and settles the deck and lesson.
    ///
    /// Answers for cards that were added to an already completed deck or
    /// lesson are accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` when the lesson, deck or card is not tracked and
    /// no completed ancestor explains it.
    pub fn answer_card(
        &mut self,
        lesson_id: LessonId,
        deck_id: DeckId,
        card_id: CardId,
        correct: bool,
        now: DateTime<Utc>,
    ) -> Result<AnswerEffect, ProgressError> {
        let lesson = self
            .lessons
            .get_mut(&lesson_id)
            .ok_or(ProgressError::UntrackedLesson(lesson_id))?;
        let lesson_done = lesson.is_completed;
        let Some(deck) = lesson.decks.get_mut(&deck_id) else {
            if lesson_done {
                return Ok(AnswerEffect::default());
            }
            return Err(ProgressError::UntrackedDeck {
                lesson: lesson_id,
                deck: deck_id,
            });
        };
        let deck_done = deck.is_completed;
        let Some(card) = deck.cards.get_mut(&card_id) else {
            if deck_done {
                return Ok(AnswerEffect::default());
            }
            return Err(ProgressError::UntrackedCard {
                deck: deck_id,
                card: card_id,
            });
        };

        let mut effect = AnswerEffect {
            card_completed: card.record(correct, now),
            ..AnswerEffect::default()
        };
        if effect.card_completed {
            effect.deck_completed = deck.settle(now);
            if effect.deck_completed {
                effect.lesson_completed = lesson.settle(now);
            }
        }
        Ok(effect)
    }

    /// Reconciles the tracked tree with the current course content.
    ///
    /// Adds lessons, decks and cards that appeared (except under completed
    /// containers), drops ones that are gone, then settles completion bottom
    /// up. Answer counters of surviving cards are untouched. Running it twice
    /// with the same outline changes nothing the second time.
    pub fn sync(&mut self, outline: &CourseOutline, now: DateTime<Utc>) -> SyncReport {
        let mut report = SyncReport::default();

        let before = self.lessons.len();
        self.lessons.retain(|id, _| outline.lesson(*id).is_some());
        report.pruned += before - self.lessons.len();

        for lesson_outline in outline.lessons() {
            let lesson = self.lessons.entry(lesson_outline.id).or_insert_with(|| {
                report.added += 1;
                LessonProgress::default()
            });

            let before = lesson.decks.len();
            lesson.decks.retain(|id, _| lesson_outline.deck(*id).is_some());
            report.pruned += before - lesson.decks.len();

            for deck_outline in &lesson_outline.decks {
                if lesson.is_completed && !lesson.decks.contains_key(&deck_outline.id) {
                    continue;
                }
                let deck = lesson.decks.entry(deck_outline.id).or_insert_with(|| {
                    report.added += 1;
                    DeckProgress::default()
                });

                let before = deck.cards.len();
                deck.cards.retain(|id, _| deck_outline.contains(*id));
                report.pruned += before - deck.cards.len();

                if !deck.is_completed {
                    for card_id in &deck_outline.cards {
                        deck.cards.entry(*card_id).or_insert_with(|| {
                            report.added += 1;
                            CardProgress::default()
                        });
                    }
                }
                if deck.settle(now) {
                    report.completed += 1;
                }
            }
            if lesson.settle(now) {
                report.completed += 1;
            }
        }

        report
    }

    /// The lesson a learner should work on next: the first lesson in outline
    /// order that is not completed, or the last lesson once all are done.
    ///
    /// Returns `None` only for a course without lessons.
    #[must_use]
    pub fn current_lesson(&self, ordered: &[LessonId]) -> Option<LessonId> {
        ordered
            .iter()
            .copied()
            .find(|id| !self.is_lesson_completed(*id))
            .or_else(|| ordered.last().copied())
    }
}

//
// ─── RECORD ────────────────────────────────────────────────────────────────────
//

/// Stored progress of one learner in one course.
///
/// `current_lesson_id` is derived from `state` and the lesson order; it is
/// only ever written together with `state`. `version` increases by one on
/// every write and backs compare-and-set updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub learner_id: LearnerId,
    pub course_id: CourseId,
    pub state: ProgressState,
    pub current_lesson_id: Option<LessonId>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// A new, unsaved record (version 0) tracking every item of `outline`.
    #[must_use]
    pub fn enroll(
        learner_id: LearnerId,
        outline: &CourseOutline,
        now: DateTime<Utc>,
    ) -> Self {
        let state = ProgressState::from_outline(outline);
        let ordered: Vec<LessonId> = outline.lesson_ids().collect();
        let current_lesson_id = state.current_lesson(&ordered);
        Self {
            learner_id,
            course_id: outline.course_id(),
            state,
            current_lesson_id,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Recomputes the cached current lesson from `outline`.
    pub fn refresh_current(&mut self, outline: &CourseOutline) {
        let ordered: Vec<LessonId> = outline.lesson_ids().collect();
        self.current_lesson_id = self.state.current_lesson(&ordered);
    }
}
