use crate::model::ids::{CardId, CourseId, DeckId, LessonId};
use crate::model::{Deck, Lesson};

/// Card ids of one deck, in deck order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeckOutline {
    pub id: DeckId,
    pub cards: Vec<CardId>,
}

impl DeckOutline {
    #[must_use]
    pub fn from_deck(deck: &Deck) -> Self {
        Self {
            id: deck.id(),
            cards: deck.card_ids().collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, card_id: CardId) -> bool {
        self.cards.contains(&card_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonOutline {
    pub id: LessonId,
    pub order: i64,
    pub decks: Vec<DeckOutline>,
}

impl LessonOutline {
    #[must_use]
    pub fn deck(&self, deck_id: DeckId) -> Option<&DeckOutline> {
        self.decks.iter().find(|d| d.id == deck_id)
    }
}

/// The content skeleton of a course: lessons in `(order, id)` order, each with
/// the decks it references and their cards.
///
/// Progress is reconciled against an outline; it carries no learner data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    course_id: CourseId,
    lessons: Vec<LessonOutline>,
}

impl CourseOutline {
    /// Builds an outline, sorting lessons by `(order, id)`.
    #[must_use]
    pub fn new(course_id: CourseId, mut lessons: Vec<LessonOutline>) -> Self {
        lessons.sort_by_key(|l| (l.order, l.id));
        Self { course_id, lessons }
    }

    /// Builds an outline from lessons and a deck lookup.
    ///
    /// Deck references `lookup` cannot resolve are left out of the lesson.
    pub fn from_lessons<'a, F>(course_id: CourseId, lessons: &[Lesson], mut lookup: F) -> Self
    where
        F: FnMut(DeckId) -> Option<&'a Deck>,
    {
        let lessons = lessons
            .iter()
            .map(|lesson| LessonOutline {
                id: lesson.id(),
                order: lesson.order(),
                decks: lesson
                    .deck_ids()
                    .iter()
                    .filter_map(|id| lookup(*id).map(DeckOutline::from_deck))
                    .collect(),
            })
            .collect();
        Self::new(course_id, lessons)
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn lessons(&self) -> &[LessonOutline] {
        &self.lessons
    }

    #[must_use]
    pub fn lesson(&self, lesson_id: LessonId) -> Option<&LessonOutline> {
        self.lessons.iter().find(|l| l.id == lesson_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn lesson_ids(&self) -> impl Iterator<Item = LessonId> + '_ {
        self.lessons.iter().map(|l| l.id)
    }
}
