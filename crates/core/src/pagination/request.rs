use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cursor::{Cursor, CursorError, CursorScope, Position};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PaginationError {
    #[error("`after` and `before` cannot be combined")]
    ConflictingCursors,

    #[error("`first` pairs with `after`, `last` pairs with `before`")]
    MixedDirection,

    #[error("page size must be positive, got {0}")]
    NonPositiveSize(i64),

    #[error("page size {requested} exceeds the maximum of {max}")]
    SizeTooLarge { requested: i64, max: u32 },

    #[error("default page size {default} must be between 1 and the maximum {max}")]
    InvalidConfig { default: u32, max: u32 },

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `after` / `first`: items following the anchor, ascending.
    Forward,
    /// `before` / `last`: items preceding the anchor.
    Backward,
}

/// Page size bounds applied to every listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    default_size: u32,
    max_size: u32,
}

impl PagingConfig {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    /// # Errors
    ///
    /// Returns `PaginationError::InvalidConfig` unless
    /// `1 <= default_size <= max_size`.
    pub fn new(default_size: u32, max_size: u32) -> Result<Self, PaginationError> {
        if default_size == 0 || default_size > max_size {
            return Err(PaginationError::InvalidConfig {
                default: default_size,
                max: max_size,
            });
        }
        Ok(Self {
            default_size,
            max_size,
        })
    }

    #[must_use]
    pub fn default_size(&self) -> u32 {
        self.default_size
    }

    #[must_use]
    pub fn max_size(&self) -> u32 {
        self.max_size
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_size: Self::DEFAULT_SIZE,
            max_size: Self::MAX_SIZE,
        }
    }
}

/// Raw pagination arguments as a client sends them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub after: Option<String>,
    pub before: Option<String>,
    pub first: Option<i64>,
    pub last: Option<i64>,
}

impl PageRequest {
    #[must_use]
    pub fn forward(first: i64, after: Option<Cursor>) -> Self {
        Self {
            after: after.map(Cursor::into_string),
            first: Some(first),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn backward(last: i64, before: Option<Cursor>) -> Self {
        Self {
            before: before.map(Cursor::into_string),
            last: Some(last),
            ..Self::default()
        }
    }

    /// Validates the arguments and decodes the cursor against `scope`.
    ///
    /// Argument shape is checked before the cursor is decoded.
    ///
    /// # Errors
    ///
    /// Returns `PaginationError::Cursor` for undecodable cursors and the other
    /// variants for invalid argument combinations or sizes.
    pub fn resolve(
        &self,
        scope: CursorScope,
        config: PagingConfig,
    ) -> Result<PageQuery, PaginationError> {
        if self.after.is_some() && self.before.is_some() {
            return Err(PaginationError::ConflictingCursors);
        }
        if (self.first.is_some() && self.last.is_some())
            || (self.after.is_some() && self.last.is_some())
            || (self.before.is_some() && self.first.is_some())
        {
            return Err(PaginationError::MixedDirection);
        }

        let backward = self.before.is_some() || self.last.is_some();
        let (direction, token, requested) = if backward {
            (Direction::Backward, self.before.as_deref(), self.last)
        } else {
            (Direction::Forward, self.after.as_deref(), self.first)
        };

        let size = match requested {
            None => config.default_size,
            Some(n) if n <= 0 => return Err(PaginationError::NonPositiveSize(n)),
            Some(n) => match u32::try_from(n) {
                Ok(n) if n <= config.max_size => n,
                _ => {
                    return Err(PaginationError::SizeTooLarge {
                        requested: n,
                        max: config.max_size,
                    });
                }
            },
        };

        let anchor = token.map(|t| Cursor::decode(t, scope)).transpose()?;

        Ok(PageQuery {
            scope,
            direction,
            anchor,
            size: size as usize,
        })
    }
}

/// A validated page request bound to one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub scope: CursorScope,
    pub direction: Direction,
    /// Exclusive bound; `None` starts at the head (forward) or tail (backward).
    pub anchor: Option<Position>,
    pub size: usize,
}
