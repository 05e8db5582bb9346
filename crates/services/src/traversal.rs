//! Client-side walks over a paginated listing.
//!
//! A [`Traversal`] pages through any [`PageSource`] from the head or from the
//! tail, checks every page against the page-info contract, and compares both
//! walks. It drives the in-process services in tests and the HTTP API in the
//! conformance run alike.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use course_core::pagination::{Connection, Direction, PageRequest};
use tracing::debug;

use crate::error::ServiceError;

/// Anything that answers page requests for one collection.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Node: Send;

    async fn fetch(&self, request: PageRequest) -> Result<Connection<Self::Node>, ServiceError>;
}

/// Pages in the order they were fetched.
#[derive(Debug, Clone)]
pub struct Walk<N> {
    pub direction: Direction,
    pub pages: Vec<Connection<N>>,
}

impl<N> Walk<N> {
    #[must_use]
    pub fn page_sizes(&self) -> Vec<usize> {
        self.pages.iter().map(Connection::len).collect()
    }

    /// Every visited node in ascending collection order.
    pub fn ascending(&self) -> Box<dyn Iterator<Item = &N> + '_> {
        match self.direction {
            Direction::Forward => Box::new(self.pages.iter().flat_map(Connection::nodes)),
            Direction::Backward => Box::new(self.pages.iter().rev().flat_map(Connection::nodes)),
        }
    }
}

/// Outcome of walking a collection both ways.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalReport<K> {
    pub forward_sizes: Vec<usize>,
    pub has_next_page: Vec<bool>,
    pub backward_sizes: Vec<usize>,
    pub has_previous_page: Vec<bool>,
    /// Keys of the collection in ascending order.
    pub keys: Vec<K>,
}

#[derive(Debug, Clone, Copy)]
pub struct Traversal {
    page_size: i64,
    max_pages: usize,
}

impl Traversal {
    pub const DEFAULT_MAX_PAGES: usize = 1_000;

    #[must_use]
    pub fn new(page_size: i64) -> Self {
        Self {
            page_size,
            max_pages: Self::DEFAULT_MAX_PAGES,
        }
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Walks from the head following `end_cursor` until `has_next_page` is false.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Traversal` when a page breaks the page-info
    /// contract or the walk exceeds the page cap, and any source error.
    pub async fn forward<S: PageSource>(&self, source: &S) -> Result<Walk<S::Node>, ServiceError> {
        self.walk(source, Direction::Forward).await
    }

    /// Walks from the tail following `start_cursor` until `has_previous_page`
    /// is false.
    ///
    /// # Errors
    ///
    /// Same as [`Self::forward`].
    pub async fn backward<S: PageSource>(&self, source: &S) -> Result<Walk<S::Node>, ServiceError> {
        self.walk(source, Direction::Backward).await
    }

    /// Walks both ways and checks that each visits every node exactly once,
    /// in the same order.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Traversal` when the walks disagree or repeat a
    /// node, and any error of the individual walks.
    pub async fn converge<S, K, F>(
        &self,
        source: &S,
        key: F,
    ) -> Result<TraversalReport<K>, ServiceError>
    where
        S: PageSource,
        K: Eq + Hash + Clone + Debug,
        F: Fn(&S::Node) -> K,
    {
        let forward = self.forward(source).await?;
        let backward = self.backward(source).await?;

        let keys: Vec<K> = forward.ascending().map(&key).collect();
        let mirrored: Vec<K> = backward.ascending().map(&key).collect();

        let mut seen = HashSet::with_capacity(keys.len());
        if let Some(dup) = keys.iter().find(|k| !seen.insert(*k)) {
            return Err(ServiceError::Traversal(format!(
                "forward walk visited {dup:?} twice"
            )));
        }
        if keys != mirrored {
            return Err(ServiceError::Traversal(format!(
                "forward walk saw {} items, backward walk saw {} items in a different order",
                keys.len(),
                mirrored.len()
            )));
        }

        Ok(TraversalReport {
            forward_sizes: forward.page_sizes(),
            has_next_page: forward
                .pages
                .iter()
                .map(|p| p.page_info.has_next_page)
                .collect(),
            backward_sizes: backward.page_sizes(),
            has_previous_page: backward
                .pages
                .iter()
                .map(|p| p.page_info.has_previous_page)
                .collect(),
            keys,
        })
    }

    async fn walk<S: PageSource>(
        &self,
        source: &S,
        direction: Direction,
    ) -> Result<Walk<S::Node>, ServiceError> {
        if self.page_size <= 0 {
            return Err(ServiceError::invalid("page size must be positive"));
        }
        let size = usize::try_from(self.page_size)
            .map_err(|_| ServiceError::invalid("page size is too large"))?;

        let mut pages: Vec<Connection<S::Node>> = Vec::new();
        let mut cursor = None;
        loop {
            if pages.len() == self.max_pages {
                return Err(ServiceError::Traversal(format!(
                    "no boundary reached within {} pages",
                    self.max_pages
                )));
            }
            let request = match direction {
                Direction::Forward => PageRequest::forward(self.page_size, cursor.take()),
                Direction::Backward => PageRequest::backward(self.page_size, cursor.take()),
            };
            let page = source.fetch(request).await?;
            check_page(&page, size, direction, pages.is_empty())?;
            debug!(?direction, page = pages.len(), size = page.len(), "fetched page");

            let (more, next) = match direction {
                Direction::Forward => (page.page_info.has_next_page, &page.page_info.end_cursor),
                Direction::Backward => (
                    page.page_info.has_previous_page,
                    &page.page_info.start_cursor,
                ),
            };
            cursor = next.clone();
            pages.push(page);
            if !more {
                return Ok(Walk { direction, pages });
            }
        }
    }
}

fn check_page<N>(
    page: &Connection<N>,
    size: usize,
    direction: Direction,
    first: bool,
) -> Result<(), ServiceError> {
    let info = &page.page_info;
    let fail = |what: &str| Err(ServiceError::Traversal(what.to_owned()));

    if page.len() > size {
        return fail("page is larger than requested");
    }
    if info.start_cursor.as_ref() != page.edges.first().map(|e| &e.cursor)
        || info.end_cursor.as_ref() != page.edges.last().map(|e| &e.cursor)
    {
        return fail("start/end cursors do not match the edges");
    }
    let more = match direction {
        Direction::Forward => info.has_next_page,
        Direction::Backward => info.has_previous_page,
    };
    if more && page.len() < size {
        return fail("short page before the boundary");
    }
    if page.is_empty() && !first {
        return fail("empty page after a page that promised more");
    }
    let behind = match direction {
        Direction::Forward => info.has_previous_page,
        Direction::Backward => info.has_next_page,
    };
    if first && behind {
        return fail("first page claims items before the start");
    }
    if !first && !page.is_empty() && !behind {
        return fail("later page claims nothing behind it");
    }
    Ok(())
}
