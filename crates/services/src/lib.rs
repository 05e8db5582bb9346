#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod content;
pub mod enrollment;
pub mod error;
pub mod lessons;
pub mod locks;
pub mod paging;
pub mod progress;
pub mod traversal;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use catalog::{CatalogService, LessonDraft};
pub use content::CourseContent;
pub use enrollment::EnrollmentService;
pub use error::{AppServicesError, ErrorKind, ServiceError};
pub use lessons::{FocusedLesson, LessonBrowser};
pub use paging::PageEngine;
pub use progress::{AnswerOutcome, AnswerSubmission, ProgressTracker};
pub use traversal::{PageSource, Traversal, TraversalReport, Walk};
