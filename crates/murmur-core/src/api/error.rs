use serde_json::Value;
use thiserror::Error;

use crate::auth::SessionError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - session may have expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Field errors reported before generic messages, in this order
const FIELD_PRIORITY: &[&str] = &[
    "content",
    "text",
    "bio",
    "name",
    "email",
    "password",
    "password_confirm",
    "profile_picture",
];

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 => ApiError::BadRequest(Self::summarize_body(body).unwrap_or(truncated)),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(Self::summarize_body(body).unwrap_or(truncated)),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// Consume a failed response and map it to an error
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::from_status(status, &body)
    }

    /// Reduce a DRF error body to one human-readable message.
    ///
    /// Field errors win over `detail`, which wins over `error`. Field values
    /// are either a string or a list of strings; the first one is used.
    pub fn summarize_body(body: &str) -> Option<String> {
        let value: Value = serde_json::from_str(body).ok()?;
        let object = value.as_object()?;

        for field in FIELD_PRIORITY {
            if let Some(message) = object.get(*field).and_then(first_message) {
                return Some(format!("{}: {}", field, message));
            }
        }
        for key in ["detail", "error", "non_field_errors"] {
            if let Some(message) = object.get(key).and_then(first_message) {
                return Some(message);
            }
        }
        object
            .iter()
            .find_map(|(field, v)| first_message(v).map(|m| format!("{}: {}", field, m)))
    }

    /// True when the error means the request was rejected for lack of a session
    pub fn is_auth_failure(&self) -> bool {
        match self {
            ApiError::Unauthorized => true,
            ApiError::Session(e) => e.is_terminal(),
            _ => false,
        }
    }
}

fn first_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_mapping() {
        assert!(matches!(ApiError::from_status(StatusCode::UNAUTHORIZED, ""), ApiError::Unauthorized));
        assert!(matches!(ApiError::from_status(StatusCode::NOT_FOUND, "nope"), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""), ApiError::RateLimited));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "down"),
            ApiError::ServerError(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::IM_A_TEAPOT, ""),
            ApiError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_bad_request_prefers_field_errors() {
        let body = r#"{"detail": "generic", "content": ["This field may not be blank."]}"#;
        match ApiError::from_status(StatusCode::BAD_REQUEST, body) {
            ApiError::BadRequest(msg) => assert_eq!(msg, "content: This field may not be blank."),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_summarize_body_detail_and_error() {
        assert_eq!(
            ApiError::summarize_body(r#"{"detail": "You cannot follow yourself."}"#).as_deref(),
            Some("You cannot follow yourself.")
        );
        assert_eq!(
            ApiError::summarize_body(r#"{"error": "Comment text is required"}"#).as_deref(),
            Some("Comment text is required")
        );
        assert_eq!(
            ApiError::summarize_body(r#"{"username": ["taken"]}"#).as_deref(),
            Some("username: taken")
        );
        assert_eq!(ApiError::summarize_body("<html>oops</html>"), None);
        assert_eq!(ApiError::summarize_body("[1, 2]"), None);
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 100);
        match ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ApiError::ServerError(msg) => {
                assert!(msg.contains("truncated"));
                assert!(msg.len() < body.len());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_is_auth_failure() {
        assert!(ApiError::Unauthorized.is_auth_failure());
        assert!(ApiError::Session(SessionError::NotAuthenticated).is_auth_failure());
        assert!(!ApiError::Session(SessionError::Transport("x".into())).is_auth_failure());
        assert!(!ApiError::RateLimited.is_auth_failure());
    }
}
