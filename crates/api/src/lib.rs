#![forbid(unsafe_code)]

pub mod error;
pub mod extract;
pub mod handlers;
pub mod schema;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::{AdminAction, AdminGate, ApiConfig, AppState};

/// HTTP surface of the course service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/courses", post(handlers::create_course))
        .route("/courses/enrolled", get(handlers::enrolled_courses))
        .route("/courses/:course_id", get(handlers::get_course))
        .route("/courses/:course_id/enroll", post(handlers::enroll))
        .route("/courses/:course_id/sync", post(handlers::sync))
        .route("/courses/:course_id/state", get(handlers::course_state))
        .route(
            "/courses/:course_id/lessons",
            get(handlers::list_lessons).post(handlers::create_lesson),
        )
        .route(
            "/courses/:course_id/lessons/focused",
            get(handlers::focused_lessons),
        )
        .route(
            "/courses/:course_id/lessons/:lesson_id/state",
            get(handlers::lesson_state),
        )
        .route(
            "/courses/:course_id/lessons/:lesson_id/decks/:deck_id/answer",
            post(handlers::answer),
        )
        .route("/decks", post(handlers::create_deck))
        .route("/decks/:deck_id", get(handlers::get_deck))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
