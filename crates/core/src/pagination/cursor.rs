use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD as BASE64};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{CourseId, LearnerId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CursorError {
    #[error("cursor is not valid base64")]
    Encoding,

    #[error("cursor payload is malformed")]
    Payload,

    #[error("cursor was issued for a different collection")]
    ScopeMismatch,

    #[error("cursor points at no item of the collection")]
    OutOfRange,
}

/// Key of an element inside an ordered collection.
///
/// Elements sort by `order`, then by `id`; the pair is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub order: i64,
    pub id: Uuid,
}

impl Position {
    #[must_use]
    pub fn new(order: i64, id: impl Into<Uuid>) -> Self {
        Self {
            order,
            id: id.into(),
        }
    }
}

/// The collection a cursor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorScope {
    /// Lessons of one course.
    Lessons(CourseId),
    /// Courses one learner is enrolled in.
    EnrolledCourses(LearnerId),
}

impl CursorScope {
    fn parts(self) -> (&'static str, Uuid) {
        match self {
            Self::Lessons(id) => ("lessons", id.value()),
            Self::EnrolledCourses(id) => ("enrolled", id.value()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Payload {
    c: String,
    s: Uuid,
    o: i64,
    i: Uuid,
}

/// Opaque, URL-safe page cursor.
///
/// The token is base64 of a small JSON document naming the collection and
/// the position, so a cursor decodes only against the collection that
/// issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Encodes `position` for `scope`.
    #[must_use]
    pub fn encode(scope: CursorScope, position: Position) -> Self {
        let (collection, owner) = scope.parts();
        let payload = Payload {
            c: collection.to_owned(),
            s: owner,
            o: position.order,
            i: position.id,
        };
        // Serializing a struct of strings, uuids and an integer cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_default();
        Self(BASE64.encode(json))
    }

    /// Decodes a client-supplied token against the collection it is used on.
    ///
    /// # Errors
    ///
    /// Returns `CursorError::Encoding` or `CursorError::Payload` for malformed
    /// tokens, and `CursorError::ScopeMismatch` for cursors of another
    /// collection.
    pub fn decode(token: &str, scope: CursorScope) -> Result<Position, CursorError> {
        let bytes = BASE64.decode(token).map_err(|_| CursorError::Encoding)?;
        let payload: Payload = serde_json::from_slice(&bytes).map_err(|_| CursorError::Payload)?;
        let (collection, owner) = scope.parts();
        if payload.c != collection || payload.s != owner {
            return Err(CursorError::ScopeMismatch);
        }
        Ok(Position {
            order: payload.o,
            id: payload.i,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
