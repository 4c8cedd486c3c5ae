//! Discovery and assignment errors, and their user-facing text.

use std::fmt::Write;

use serde_json::Value;
use thiserror::Error;

use proxima_providers::ServiceError;
use proxima_types::{
    AlreadyEngaged, NonEmptyStaticStr, NonEmptyString, ProfessionalId, ProjectId,
    truncate_with_ellipsis,
};

const ASSIGNMENT_ERROR_BADGE: NonEmptyStaticStr = NonEmptyStaticStr::new("[Invite failed]");
const DIRECTORY_ERROR_BADGE: NonEmptyStaticStr =
    NonEmptyStaticStr::new("[Directory unavailable]");

/// The professional directory could not be queried. Results are cleared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("professional directory unavailable: {reason}")]
pub struct DirectoryUnavailable {
    pub status: Option<u16>,
    pub reason: String,
}

impl From<ServiceError> for DirectoryUnavailable {
    fn from(err: ServiceError) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            reason: err.to_string(),
        }
    }
}

/// Live positioning, stored profile coordinate and city lookup all failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("location unavailable: no device fix, stored coordinate or resolvable city")]
pub struct LocationUnavailable;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignmentError {
    #[error("no active project; choose a project before inviting professionals")]
    NoActiveProject,
    #[error("{0} is already engaged with this project")]
    AlreadyEngaged(ProfessionalId),
    #[error("assignment targets project {requested}, but {} is active", active.as_ref().map_or("no project", ProjectId::as_str))]
    ProjectMismatch {
        requested: ProjectId,
        active: Option<ProjectId>,
    },
    #[error("project service rejected the assignment ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("project service unreachable: {0}")]
    Unreachable(String),
}

impl From<AlreadyEngaged> for AssignmentError {
    fn from(err: AlreadyEngaged) -> Self {
        Self::AlreadyEngaged(err.0)
    }
}

impl From<ServiceError> for AssignmentError {
    fn from(err: ServiceError) -> Self {
        match (err.status(), err.body()) {
            (Some(status), Some(body)) => Self::Rejected {
                status: status.as_u16(),
                message: extract_error_message(body).unwrap_or_else(|| body.trim().to_string()),
            },
            _ => Self::Unreachable(err.to_string()),
        }
    }
}

/// Pull a human-readable message out of a JSON error body.
///
/// Accepts `{"error":{"message"}}`, `{"message"}`, `{"error":"..."}` and a bare
/// JSON string.
pub fn extract_error_message(raw: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(raw.trim()).ok()?;
    payload
        .pointer("/error/message")
        .and_then(|value| value.as_str())
        .or_else(|| payload.pointer("/message").and_then(|value| value.as_str()))
        .or_else(|| payload.pointer("/error").and_then(|value| value.as_str()))
        .or_else(|| payload.as_str())
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
}

fn badged(badge: NonEmptyStaticStr, headline: &str, detail: Option<&str>) -> NonEmptyString {
    let mut content = String::new();
    content.push_str(badge.as_str());
    content.push_str("\n\n");
    content.push_str(headline);
    if let Some(detail) = detail.map(str::trim).filter(|d| !d.is_empty()) {
        let _ = write!(content, "\n\nDetails: {}", truncate_with_ellipsis(detail, 200));
    }
    NonEmptyString::new(content).unwrap_or_else(|_| badge.into())
}

/// Format an assignment failure for display next to the invite action.
#[must_use]
pub fn format_assignment_error(err: &AssignmentError) -> NonEmptyString {
    match err {
        AssignmentError::NoActiveProject => badged(
            ASSIGNMENT_ERROR_BADGE,
            "Select a project first. Professionals can only be invited to an active project.",
            None,
        ),
        AssignmentError::AlreadyEngaged(_) => badged(
            ASSIGNMENT_ERROR_BADGE,
            "This professional is already on the project team or has a pending invite.",
            None,
        ),
        AssignmentError::ProjectMismatch { .. } => badged(
            ASSIGNMENT_ERROR_BADGE,
            "The active project changed. Reopen the profile and try again.",
            None,
        ),
        AssignmentError::Rejected { status, message } => badged(
            ASSIGNMENT_ERROR_BADGE,
            &format!("The project service refused the invite ({status})."),
            Some(message),
        ),
        AssignmentError::Unreachable(reason) => badged(
            ASSIGNMENT_ERROR_BADGE,
            "Could not reach the project service. Check your connection and retry.",
            Some(reason),
        ),
    }
}

/// Format a directory failure for the retry affordance.
#[must_use]
pub fn format_directory_error(err: &DirectoryUnavailable) -> NonEmptyString {
    let headline = match err.status {
        Some(status) => format!("Could not load nearby professionals ({status})."),
        None => "Could not load nearby professionals.".to_string(),
    };
    badged(
        DIRECTORY_ERROR_BADGE,
        &format!("{headline} Retry to search again."),
        Some(&err.reason),
    )
}
