use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::ids::{CourseId, DeckId, LessonId};
use crate::pagination::{Keyed, Position};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson description cannot be empty")]
    EmptyDescription,

    #[error("lesson body cannot be empty")]
    EmptyBody,

    #[error("lesson must reference at least one deck")]
    NoDecksReferenced,
}

//
// ─── DECK REFERENCES ───────────────────────────────────────────────────────────
//

static DECK_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[deck\]\(([a-f0-9\-]{36})\)").expect("Invalid deck reference regex")
});

/// Extracts the decks a lesson body embeds with `![deck](<uuid>)` markers.
///
/// Duplicates are dropped, first occurrence wins. Markers that are not valid
/// UUIDs are skipped.
#[must_use]
pub fn parse_deck_references(body: &str) -> Vec<DeckId> {
    let mut out: Vec<DeckId> = Vec::new();
    for caps in DECK_REFERENCE.captures_iter(body) {
        let Some(raw) = caps.get(1) else { continue };
        let Ok(id) = Uuid::parse_str(raw.as_str()) else {
            continue;
        };
        let id = DeckId::new(id);
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

//
// ─── PROJECTION ────────────────────────────────────────────────────────────────
//

/// Which lesson fields a listing materialises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LessonProjection {
    #[default]
    Full,
    /// Everything except the body.
    Bodyless,
}

impl LessonProjection {
    #[must_use]
    pub fn from_bodyless(bodyless: bool) -> Self {
        if bodyless { Self::Bodyless } else { Self::Full }
    }

    #[must_use]
    pub fn includes_body(self) -> bool {
        matches!(self, Self::Full)
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A lesson within a course.
///
/// `body` is `None` only for bodyless projections; a stored lesson always has
/// one. `deck_ids` is derived from the body at creation time and kept even
/// when the body is projected away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    id: LessonId,
    course_id: CourseId,
    order: i64,
    title: String,
    description: String,
    body: Option<String>,
    deck_ids: Vec<DeckId>,
    created_at: DateTime<Utc>,
}

impl Lesson {
    /// Creates a validated lesson and resolves its deck references.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` when title, description or body are blank, or the
    /// body references no deck.
    pub fn new(
        id: LessonId,
        course_id: CourseId,
        order: i64,
        title: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, LessonError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        let description = description.into().trim().to_owned();
        if description.is_empty() {
            return Err(LessonError::EmptyDescription);
        }
        let body = body.into();
        if body.trim().is_empty() {
            return Err(LessonError::EmptyBody);
        }
        let deck_ids = parse_deck_references(&body);
        if deck_ids.is_empty() {
            return Err(LessonError::NoDecksReferenced);
        }

        Ok(Self {
            id,
            course_id,
            order,
            title,
            description,
            body: Some(body),
            deck_ids,
            created_at,
        })
    }

    /// Rehydrates a lesson read back from storage without re-validating it.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: LessonId,
        course_id: CourseId,
        order: i64,
        title: String,
        description: String,
        body: Option<String>,
        deck_ids: Vec<DeckId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            course_id,
            order,
            title,
            description,
            body,
            deck_ids,
            created_at,
        }
    }

    /// Applies a projection, dropping the body for `Bodyless`.
    #[must_use]
    pub fn project(mut self, projection: LessonProjection) -> Self {
        if !projection.includes_body() {
            self.body = None;
        }
        self
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
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
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    #[must_use]
    pub fn deck_ids(&self) -> &[DeckId] {
        &self.deck_ids
    }

    #[must_use]
    pub fn references_deck(&self, deck_id: DeckId) -> bool {
        self.deck_ids.contains(&deck_id)
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Keyed for Lesson {
    fn position(&self) -> Position {
        Position::new(self.order, self.id.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    const DECK_A: &str = "0b7e7f0e-6a43-4d36-9c39-1f3a4d2b9a10";
    const DECK_B: &str = "c2d1e3f4-a5b6-4c7d-8e9f-0a1b2c3d4e5f";

    fn body_with(decks: &[&str]) -> String {
        decks
            .iter()
            .map(|d| format!("Intro text\n\n![deck]({d})\n"))
            .collect()
    }

    #[test]
    fn references_are_deduplicated_in_order() {
        let body = body_with(&[DECK_B, DECK_A, DECK_B]);
        let refs = parse_deck_references(&body);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].to_string(), DECK_B);
        assert_eq!(refs[1].to_string(), DECK_A);
    }

    #[test]
    fn malformed_markers_are_ignored() {
        let body = "![deck](not-a-uuid) ![image](0b7e7f0e-6a43-4d36-9c39-1f3a4d2b9a10)";
        assert!(parse_deck_references(body).is_empty());
    }

    #[test]
    fn lesson_without_deck_is_rejected() {
        let err = Lesson::new(
            LessonId::generate(),
            CourseId::generate(),
            1,
            "Title",
            "Desc",
            "no decks here",
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, LessonError::NoDecksReferenced);
    }

    #[test]
    fn blank_body_is_rejected_before_references() {
        let err = Lesson::new(
            LessonId::generate(),
            CourseId::generate(),
            1,
            "Title",
            "Desc",
            "  ",
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, LessonError::EmptyBody);
    }

    #[test]
    fn bodyless_projection_keeps_everything_else() {
        let lesson = Lesson::new(
            LessonId::generate(),
            CourseId::generate(),
            2,
            "Title",
            "Desc",
            body_with(&[DECK_A]),
            fixed_now(),
        )
        .unwrap();
        let bodyless = lesson.clone().project(LessonProjection::Bodyless);
        assert!(bodyless.body().is_none());
        assert_eq!(bodyless.id(), lesson.id());
        assert_eq!(bodyless.order(), lesson.order());
        assert_eq!(bodyless.deck_ids(), lesson.deck_ids());

        let full = lesson.clone().project(LessonProjection::Full);
        assert_eq!(full, lesson);
    }
}
