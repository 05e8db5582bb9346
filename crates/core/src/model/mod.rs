mod course;
mod deck;
mod ids;
mod lesson;
mod outline;
mod progress;

pub use ids::{AnswerId, CardId, CourseId, DeckId, LearnerId, LessonId, ParseIdError};

pub use course::{Course, CourseError, EnrolledCourse};
pub use deck::{Answer, AnswerDraft, Card, CardDraft, CardKind, Deck, DeckDraft, DeckError};
pub use lesson::{Lesson, LessonError, LessonProjection, parse_deck_references};
pub use outline::{CourseOutline, DeckOutline, LessonOutline};
pub use progress::{
    AnswerEffect, CardProgress, DeckProgress, LessonProgress, ProgressError, ProgressRecord,
    ProgressState, SyncReport,
};
