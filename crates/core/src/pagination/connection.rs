use serde::{Deserialize, Serialize};

use super::cursor::Cursor;
use super::request::{Direction, PageQuery};
use super::slice::{Keyed, Slice};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge<T> {
    pub cursor: Cursor,
    pub node: T,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<Cursor>,
    pub end_cursor: Option<Cursor>,
}

/// One page of an ordered collection. Edges are always ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

impl<T> Connection<T> {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
        }
    }

    /// Builds a page from a probing slice (see `SliceRequest::probing`).
    ///
    /// The extra lookahead item, if present, is dropped and reported through the
    /// flag on the far side of the page. Backward slices are flipped back to
    /// ascending order.
    #[must_use]
    pub fn assemble(query: &PageQuery, slice: Slice<T>) -> Self
    where
        T: Keyed,
    {
        let Slice {
            mut items,
            has_behind,
            ..
        } = slice;
        let has_more = items.len() > query.size;
        items.truncate(query.size);
        if query.direction == Direction::Backward {
            items.reverse();
        }

        let (has_next_page, has_previous_page) = match query.direction {
            Direction::Forward => (has_more, has_behind),
            Direction::Backward => (has_behind, has_more),
        };

        let edges: Vec<Edge<T>> = items
            .into_iter()
            .map(|node| Edge {
                cursor: Cursor::encode(query.scope, node.position()),
                node,
            })
            .collect();

        let page_info = PageInfo {
            has_next_page,
            has_previous_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };

        Self { edges, page_info }
    }

    /// Transforms every node, keeping cursors and page info.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> Connection<U> {
        Connection {
            edges: self
                .edges
                .into_iter()
                .map(|e| Edge {
                    cursor: e.cursor,
                    node: f(e.node),
                })
                .collect(),
            page_info: self.page_info,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.edges.iter().map(|e| &e.node)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CourseId;
    use crate::pagination::cursor::{CursorScope, Position};
    use crate::pagination::slice::{SliceRequest, slice_sorted};
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq)]
    struct Item(Position);

    impl Keyed for Item {
        fn position(&self) -> Position {
            self.0
        }
    }

    fn collection(n: i64) -> Vec<Item> {
        (1..=n).map(|o| Item(Position::new(o, Uuid::new_v4()))).collect()
    }

    fn page(all: &[Item], query: &PageQuery) -> Connection<Item> {
        Connection::assemble(query, slice_sorted(all, &SliceRequest::probing(query)))
    }

    fn query(direction: Direction, anchor: Option<&Cursor>, size: usize, scope: CursorScope) -> PageQuery {
        PageQuery {
            scope,
            direction,
            anchor: anchor.map(|c| Cursor::decode(c.as_str(), scope).unwrap()),
            size,
        }
    }

    #[test]
    fn five_items_forward_in_pages_of_two() {
        let scope = CursorScope::Lessons(CourseId::generate());
        let all = collection(5);
        let mut cursor = None;
        let mut sizes = Vec::new();
        let mut next_flags = Vec::new();
        let mut prev_flags = Vec::new();
        let mut seen = Vec::new();
        loop {
            let p = page(&all, &query(Direction::Forward, cursor.as_ref(), 2, scope));
            sizes.push(p.len());
            next_flags.push(p.page_info.has_next_page);
            prev_flags.push(p.page_info.has_previous_page);
            seen.extend(p.nodes().map(|i| i.0.order));
            if !p.page_info.has_next_page {
                break;
            }
            cursor = p.page_info.end_cursor;
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(next_flags, vec![true, true, false]);
        assert_eq!(prev_flags, vec![false, true, true]);
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn five_items_backward_in_pages_of_two() {
        let scope = CursorScope::Lessons(CourseId::generate());
        let all = collection(5);
        let mut cursor = None;
        let mut pages = Vec::new();
        loop {
            let p = page(&all, &query(Direction::Backward, cursor.as_ref(), 2, scope));
            let orders: Vec<i64> = p.nodes().map(|i| i.0.order).collect();
            pages.push((orders, p.page_info.has_previous_page, p.page_info.has_next_page));
            if !p.page_info.has_previous_page {
                break;
            }
            cursor = p.page_info.start_cursor;
        }
        assert_eq!(
            pages,
            vec![
                (vec![4, 5], true, false),
                (vec![2, 3], true, true),
                (vec![1], false, true),
            ]
        );
    }

    #[test]
    fn empty_collection_has_no_cursors() {
        let scope = CursorScope::Lessons(CourseId::generate());
        for direction in [Direction::Forward, Direction::Backward] {
            let p = page(&[], &query(direction, None, 3, scope));
            assert!(p.is_empty());
            assert_eq!(p.page_info, PageInfo::default());
        }
    }

    #[test]
    fn start_and_end_cursors_match_edges() {
        let scope = CursorScope::Lessons(CourseId::generate());
        let all = collection(3);
        let p = page(&all, &query(Direction::Forward, None, 3, scope));
        assert_eq!(p.page_info.start_cursor.as_ref(), Some(&p.edges[0].cursor));
        assert_eq!(p.page_info.end_cursor.as_ref(), Some(&p.edges[2].cursor));
        assert!(!p.page_info.has_next_page);
        assert!(!p.page_info.has_previous_page);
    }
}
