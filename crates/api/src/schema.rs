//! Request and response bodies, one explicit type per endpoint.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use course_core::model::{
    AnswerId, CardId, CardKind, Course, CourseId, Deck, DeckId, DeckProgress, EnrolledCourse,
    Lesson, LessonId, LessonProgress, ProgressRecord,
};
use serde::{Deserialize, Serialize};
use services::FocusedLesson;

//
// ─── REQUESTS ──────────────────────────────────────────────────────────────────
//

/// Query string of every paginated listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub after: Option<String>,
    pub before: Option<String>,
    pub first: Option<i64>,
    pub last: Option<i64>,
    #[serde(default)]
    pub bodyless: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseRequest {
    pub order: i64,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLessonRequest {
    pub order: i64,
    pub title: String,
    pub description: String,
    pub body: String,
}

//
// ─── NODES ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseNode {
    pub id: CourseId,
    pub order: i64,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Course> for CourseNode {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id(),
            order: course.order(),
            title: course.title().to_owned(),
            description: course.description().to_owned(),
            created_at: course.created_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrolledCourseNode {
    #[serde(flatten)]
    pub course: CourseNode,
    pub current_lesson_id: Option<LessonId>,
}

impl From<EnrolledCourse> for EnrolledCourseNode {
    fn from(enrolled: EnrolledCourse) -> Self {
        Self {
            course: CourseNode::from(&enrolled.course),
            current_lesson_id: enrolled.current_lesson_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonNode {
    pub id: LessonId,
    pub course_id: CourseId,
    pub order: i64,
    pub title: String,
    pub description: String,
    /// Absent from bodyless listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub deck_ids: Vec<DeckId>,
    pub created_at: DateTime<Utc>,
}

impl From<Lesson> for LessonNode {
    fn from(lesson: Lesson) -> Self {
        Self {
            id: lesson.id(),
            course_id: lesson.course_id(),
            order: lesson.order(),
            title: lesson.title().to_owned(),
            description: lesson.description().to_owned(),
            body: lesson.body().map(str::to_owned),
            deck_ids: lesson.deck_ids().to_vec(),
            created_at: lesson.created_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedLessonNode {
    #[serde(flatten)]
    pub lesson: LessonNode,
    pub is_completed: bool,
    pub is_current: bool,
}

impl From<FocusedLesson> for FocusedLessonNode {
    fn from(focused: FocusedLesson) -> Self {
        Self {
            lesson: LessonNode::from(focused.lesson),
            is_completed: focused.is_completed,
            is_current: focused.is_current,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerNode {
    pub id: AnswerId,
    pub card_id: CardId,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardNode {
    pub id: CardId,
    pub deck_id: DeckId,
    pub title: String,
    pub explanation: String,
    pub kind: CardKind,
    pub possible_answers: Vec<AnswerNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckNode {
    pub id: DeckId,
    pub title: String,
    pub description: String,
    pub cards: Vec<CardNode>,
}

impl From<&Deck> for DeckNode {
    fn from(deck: &Deck) -> Self {
        Self {
            id: deck.id(),
            title: deck.title().to_owned(),
            description: deck.description().to_owned(),
            cards: deck
                .cards()
                .iter()
                .map(|card| CardNode {
                    id: card.id,
                    deck_id: deck.id(),
                    title: card.title.clone(),
                    explanation: card.explanation.clone(),
                    kind: card.kind,
                    possible_answers: card
                        .possible_answers
                        .iter()
                        .map(|a| AnswerNode {
                            id: a.id,
                            card_id: card.id,
                            text: a.text.clone(),
                            is_correct: a.is_correct,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStateBody {
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeckStateBody {
    pub is_completed: bool,
    pub cards: BTreeMap<CardId, CardStateBody>,
}

impl From<&DeckProgress> for DeckStateBody {
    fn from(deck: &DeckProgress) -> Self {
        Self {
            is_completed: deck.is_completed(),
            cards: deck
                .cards()
                .iter()
                .map(|(id, card)| {
                    let body = CardStateBody {
                        is_completed: card.is_completed(),
                    };
                    (*id, body)
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonStateBody {
    pub is_completed: bool,
    pub decks: BTreeMap<DeckId, DeckStateBody>,
}

impl From<&LessonProgress> for LessonStateBody {
    fn from(lesson: &LessonProgress) -> Self {
        Self {
            is_completed: lesson.is_completed(),
            decks: lesson
                .decks()
                .iter()
                .map(|(id, deck)| (*id, DeckStateBody::from(deck)))
                .collect(),
        }
    }
}

/// `GET .../state` for one lesson or a whole course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateResponse {
    pub lesson_state: BTreeMap<LessonId, LessonStateBody>,
}

impl StateResponse {
    pub fn from_lessons<'a>(lessons: impl IntoIterator<Item = (LessonId, &'a LessonProgress)>) -> Self {
        Self {
            lesson_state: lessons
                .into_iter()
                .map(|(id, lesson)| (id, LessonStateBody::from(lesson)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentResponse {
    pub course_id: CourseId,
    pub current_lesson_id: Option<LessonId>,
}

impl From<&ProgressRecord> for EnrollmentResponse {
    fn from(record: &ProgressRecord) -> Self {
        Self {
            course_id: record.course_id,
            current_lesson_id: record.current_lesson_id,
        }
    }
}

/// Empty JSON object for endpoints that only acknowledge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
