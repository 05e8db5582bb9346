use std::sync::Arc;

use course_core::pagination::PagingConfig;
use storage::repository::Storage;

use crate::Clock;
use crate::catalog::CatalogService;
use crate::content::CourseContent;
use crate::enrollment::EnrollmentService;
use crate::error::AppServicesError;
use crate::lessons::LessonBrowser;
use crate::locks::KeyedLocks;
use crate::paging::PageEngine;
use crate::progress::ProgressTracker;

/// Assembles the services over one storage backend.
///
/// Progress writers share one lock table so enrollment, sync and answers for
/// the same learner and course never interleave in-process.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<CatalogService>,
    lessons: Arc<LessonBrowser>,
    progress: Arc<ProgressTracker>,
    enrollment: Arc<EnrollmentService>,
}

impl AppServices {
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, paging: PagingConfig) -> Self {
        let engine = PageEngine::new(paging);
        let content = CourseContent::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.lessons),
            Arc::clone(&storage.decks),
        );
        let locks = Arc::new(KeyedLocks::new());

        let catalog = Arc::new(CatalogService::new(clock, content.clone()));
        let lessons = Arc::new(LessonBrowser::new(
            content.clone(),
            Arc::clone(&storage.progress),
            engine,
        ));
        let progress = Arc::new(ProgressTracker::with_locks(
            clock,
            content.clone(),
            Arc::clone(&storage.progress),
            Arc::clone(&locks),
        ));
        let enrollment = Arc::new(EnrollmentService::new(
            clock,
            content,
            Arc::clone(&storage.progress),
            locks,
            engine,
        ));

        Self {
            catalog,
            lessons,
            progress,
            enrollment,
        }
    }

    #[must_use]
    pub fn in_memory(clock: Clock, paging: PagingConfig) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, paging)
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn sqlite(
        db_url: &str,
        clock: Clock,
        paging: PagingConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, paging))
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn lessons(&self) -> Arc<LessonBrowser> {
        Arc::clone(&self.lessons)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn enrollment(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollment)
    }
}
