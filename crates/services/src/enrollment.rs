use std::collections::HashMap;
use std::sync::Arc;

use course_core::model::{CourseId, EnrolledCourse, LearnerId, ProgressRecord, SyncReport};
use course_core::pagination::{Connection, CursorScope, PageRequest};
use storage::repository::{ProgressRepository, StorageError};
use tracing::{info, instrument, warn};

use crate::Clock;
use crate::content::{CourseContent, current_lesson};
use crate::error::ServiceError;
use crate::paging::PageEngine;
use crate::progress::{MAX_WRITE_ATTEMPTS, ProgressLocks, write_progress};

/// Creates and repairs learner progress, and lists a learner's courses.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    content: CourseContent,
    progress: Arc<dyn ProgressRepository>,
    locks: Arc<ProgressLocks>,
    engine: PageEngine,
}

impl EnrollmentService {
    pub(crate) fn new(
        clock: Clock,
        content: CourseContent,
        progress: Arc<dyn ProgressRepository>,
        locks: Arc<ProgressLocks>,
        engine: PageEngine,
    ) -> Self {
        Self {
            clock,
            content,
            progress,
            locks,
            engine,
        }
    }

    /// Starts tracking every lesson, deck and card of the course.
    ///
    /// Enrolling twice returns the existing record untouched.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown course and
    /// `ServiceError::InvalidArgument` for a course without lessons.
    #[instrument(skip(self), fields(%learner_id, %course_id))]
    pub async fn enroll(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<ProgressRecord, ServiceError> {
        self.content.course(course_id).await?;
        let _guard = self.locks.lock((learner_id, course_id)).await;

        if let Some(existing) = self.progress.get_progress(learner_id, course_id).await? {
            return Ok(existing);
        }
        let outline = self.content.outline(course_id).await?;
        if outline.is_empty() {
            return Err(ServiceError::invalid("course has no lessons"));
        }

        let now = self.clock.now();
        let mut record = ProgressRecord::enroll(learner_id, &outline, now);
        match write_progress(self.progress.as_ref(), &mut record, now).await {
            Ok(()) => {
                info!("learner enrolled");
                Ok(record)
            }
            Err(StorageError::Conflict) => self
                .progress
                .get_progress(learner_id, course_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("progress")),
            Err(e) => Err(e.into()),
        }
    }

    /// Brings stored progress in line with the current course content.
    ///
    /// A learner without progress has nothing to repair and gets an empty
    /// report.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown course, and storage
    /// errors.
    #[instrument(skip(self), fields(%learner_id, %course_id))]
    pub async fn sync(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<SyncReport, ServiceError> {
        self.content.course(course_id).await?;
        let _guard = self.locks.lock((learner_id, course_id)).await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(mut record) = self.progress.get_progress(learner_id, course_id).await? else {
                return Ok(SyncReport::default());
            };
            let now = self.clock.now();
            let outline = self.content.outline(course_id).await?;
            let report = record.state.sync(&outline, now);
            let previous_current = record.current_lesson_id;
            record.refresh_current(&outline);
            if report.is_noop() && previous_current == record.current_lesson_id {
                return Ok(report);
            }

            match write_progress(self.progress.as_ref(), &mut record, now).await {
                Ok(()) => {
                    info!(
                        added = report.added,
                        pruned = report.pruned,
                        completed = report.completed,
                        "progress synced"
                    );
                    return Ok(report);
                }
                Err(StorageError::Conflict) if attempt < MAX_WRITE_ATTEMPTS => {
                    warn!(attempt, "progress sync lost a race, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Courses the learner has progress in, by course order.
    ///
    /// The current lesson of each course is derived from the lessons stored
    /// now, so it agrees with [`crate::LessonBrowser::focused`] even before
    /// the record is synced.
    ///
    /// # Errors
    ///
    /// Returns paging errors from [`PageEngine::page`].
    #[instrument(skip(self, request), fields(%learner_id))]
    pub async fn enrolled_courses(
        &self,
        learner_id: LearnerId,
        request: &PageRequest,
    ) -> Result<Connection<EnrolledCourse>, ServiceError> {
        let progress = &self.progress;
        let page = self
            .engine
            .page(
                CursorScope::EnrolledCourses(learner_id),
                request,
                |slice| async move { progress.enrolled_slice(learner_id, &slice).await },
            )
            .await?;

        let mut live = HashMap::new();
        for enrolled in page.nodes() {
            let course_id = enrolled.course.id();
            let ordered = self.content.lesson_order(course_id).await?;
            let record = self.progress.get_progress(learner_id, course_id).await?;
            live.insert(course_id, current_lesson(&ordered, record.as_ref()));
        }
        Ok(page.map(|mut enrolled| {
            if let Some(current) = live.get(&enrolled.course.id()) {
                enrolled.current_lesson_id = *current;
            }
            enrolled
        }))
    }
}
