use std::future::Future;

use course_core::pagination::{
    Connection, CursorError, CursorScope, Keyed, PageRequest, PagingConfig, Slice, SliceRequest,
};
use storage::repository::StorageError;
use tracing::debug;

use crate::error::ServiceError;

/// Turns client page arguments into one store slice and a page.
///
/// Every listing goes through here, so plain and focused views share the
/// same validation, cursors and page info.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageEngine {
    config: PagingConfig,
}

impl PageEngine {
    #[must_use]
    pub fn new(config: PagingConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> PagingConfig {
        self.config
    }

    /// Resolves `request` against `scope`, reads one probing slice through
    /// `fetch`, and assembles the page.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidArgument` or `ServiceError::InvalidCursor`
    /// for bad arguments, `ServiceError::InvalidCursor` when the cursor names
    /// no item of the collection, and storage errors from `fetch`.
    pub async fn page<T, F, Fut>(
        &self,
        scope: CursorScope,
        request: &PageRequest,
        fetch: F,
    ) -> Result<Connection<T>, ServiceError>
    where
        T: Keyed,
        F: FnOnce(SliceRequest) -> Fut,
        Fut: Future<Output = Result<Slice<T>, StorageError>>,
    {
        let query = request.resolve(scope, self.config)?;
        debug!(
            ?scope,
            direction = ?query.direction,
            anchored = query.anchor.is_some(),
            size = query.size,
            "resolved page"
        );
        let slice = fetch(SliceRequest::probing(&query)).await?;
        if query.anchor.is_some() && !slice.anchor_found {
            return Err(ServiceError::InvalidCursor(CursorError::OutOfRange));
        }
        Ok(Connection::assemble(&query, slice))
    }
}
