use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderName};
use services::AppServices;

use crate::error::ApiError;

/// Operations that can be restricted to holders of the admin secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminAction {
    CreateCourse,
    CreateLesson,
    CreateDeck,
    Enroll,
}

impl AdminAction {
    pub const ALL: [Self; 4] = [
        Self::CreateCourse,
        Self::CreateLesson,
        Self::CreateDeck,
        Self::Enroll,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateCourse => "create-course",
            Self::CreateLesson => "create-lesson",
            Self::CreateDeck => "create-deck",
            Self::Enroll => "enroll",
        }
    }
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s.trim())
            .ok_or_else(|| format!("unknown admin action `{s}`"))
    }
}

/// Shared-secret gate in front of authoring endpoints.
#[derive(Debug, Clone, Default)]
pub struct AdminGate {
    header: Option<HeaderName>,
    secret: Option<String>,
    gated: HashSet<AdminAction>,
}

impl AdminGate {
    /// A gate that lets every request through.
    #[must_use]
    pub fn open() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(
        header: Option<HeaderName>,
        secret: Option<String>,
        gated: impl IntoIterator<Item = AdminAction>,
    ) -> Self {
        Self {
            header,
            secret,
            gated: gated.into_iter().collect(),
        }
    }

    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` when the action is gated and the header
    /// does not carry the secret, and `ApiError::AdminNotConfigured` when the
    /// action is gated but no header or secret is configured.
    pub fn check(&self, action: AdminAction, headers: &HeaderMap) -> Result<(), ApiError> {
        if !self.gated.contains(&action) {
            return Ok(());
        }
        let (Some(header), Some(secret)) = (&self.header, &self.secret) else {
            return Err(ApiError::AdminNotConfigured);
        };
        match headers.get(header).and_then(|v| v.to_str().ok()) {
            Some(presented) if presented == secret => Ok(()),
            _ => {
                tracing::warn!(%action, "admin check failed");
                Err(ApiError::Forbidden)
            }
        }
    }
}

/// Settings of the HTTP surface itself.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub learner_header: HeaderName,
    pub admin: AdminGate,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            learner_header: HeaderName::from_static("x-learner-id"),
            admin: AdminGate::open(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices, config: ApiConfig) -> Self {
        Self {
            services,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn gate() -> AdminGate {
        AdminGate::new(
            Some(HeaderName::from_static("x-admin")),
            Some("s3cret".into()),
            [AdminAction::CreateCourse],
        )
    }

    #[test]
    fn ungated_actions_pass_without_credentials() {
        assert!(gate().check(AdminAction::Enroll, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn gated_actions_need_the_secret() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            gate().check(AdminAction::CreateCourse, &headers),
            Err(ApiError::Forbidden)
        ));
        headers.insert("x-admin", HeaderValue::from_static("s3cret"));
        assert!(gate().check(AdminAction::CreateCourse, &headers).is_ok());
    }

    #[test]
    fn gating_without_a_secret_is_a_server_error() {
        let gate = AdminGate::new(None, None, [AdminAction::CreateDeck]);
        assert!(matches!(
            gate.check(AdminAction::CreateDeck, &HeaderMap::new()),
            Err(ApiError::AdminNotConfigured)
        ));
    }

    #[test]
    fn actions_parse_from_their_names() {
        assert_eq!("enroll".parse::<AdminAction>(), Ok(AdminAction::Enroll));
        assert!("delete-everything".parse::<AdminAction>().is_err());
    }
}
