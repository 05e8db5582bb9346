use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use course_core::model::LearnerId;

use crate::error::ApiError;
use crate::state::AppState;

/// The learner a request acts for, read from the configured header.
///
/// Identity is established upstream; this only parses what the gateway
/// forwards.
#[derive(Debug, Clone, Copy)]
pub struct Learner(pub LearnerId);

#[async_trait]
impl FromRequestParts<AppState> for Learner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = &state.config.learner_header;
        let raw = parts
            .headers
            .get(header)
            .ok_or_else(|| ApiError::BadRequest(format!("missing `{header}` header")))?
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("`{header}` header is not text")))?;
        raw.trim()
            .parse()
            .map(Self)
            .map_err(|e| ApiError::BadRequest(format!("`{header}` header: {e}")))
    }
}
