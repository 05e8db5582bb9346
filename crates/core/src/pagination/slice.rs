use super::cursor::Position;
use super::request::{Direction, PageQuery};

/// Anything that sits at a unique position of an ordered collection.
pub trait Keyed {
    fn position(&self) -> Position;
}

/// What a store is asked for: up to `limit` items strictly past `anchor` in
/// `direction`, nearest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceRequest {
    pub direction: Direction,
    pub anchor: Option<Position>,
    pub limit: usize,
}

impl SliceRequest {
    /// A request one item larger than the page, so the store result alone
    /// tells whether more items follow.
    #[must_use]
    pub fn probing(query: &PageQuery) -> Self {
        Self {
            direction: query.direction,
            anchor: query.anchor,
            limit: query.size.saturating_add(1),
        }
    }

    /// True when `position` lies strictly past the anchor in this direction.
    #[must_use]
    pub fn admits(&self, position: Position) -> bool {
        match (self.direction, self.anchor) {
            (_, None) => true,
            (Direction::Forward, Some(a)) => position > a,
            (Direction::Backward, Some(a)) => position < a,
        }
    }

    /// True when `position` lies at or behind the anchor.
    #[must_use]
    pub fn is_behind(&self, position: Position) -> bool {
        self.anchor.is_some() && !self.admits(position)
    }
}

/// A store's answer to a [`SliceRequest`], read from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice<T> {
    /// Nearest first: ascending for forward, descending for backward.
    pub items: Vec<T>,
    /// Whether any item sits at or behind the anchor.
    pub has_behind: bool,
    /// Whether an item sits exactly at the anchor. False when unanchored.
    pub anchor_found: bool,
}

impl<T> Slice<T> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_behind: false,
            anchor_found: false,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Slice<U> {
        Slice {
            items: self.items.into_iter().map(f).collect(),
            has_behind: self.has_behind,
            anchor_found: self.anchor_found,
        }
    }
}

/// Cuts a slice out of items already sorted ascending by position.
pub fn slice_sorted<T: Keyed + Clone>(sorted: &[T], request: &SliceRequest) -> Slice<T> {
    let has_behind = sorted.iter().any(|item| request.is_behind(item.position()));
    let anchor_found = request
        .anchor
        .is_some_and(|a| sorted.iter().any(|item| item.position() == a));
    let admitted = sorted.iter().filter(|item| request.admits(item.position()));
    let items = match request.direction {
        Direction::Forward => admitted.take(request.limit).cloned().collect(),
        Direction::Backward => admitted.rev().take(request.limit).cloned().collect(),
    };
    Slice {
        items,
        has_behind,
        anchor_found,
    }
}
