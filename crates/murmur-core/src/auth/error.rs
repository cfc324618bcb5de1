use thiserror::Error;

use crate::api::ApiError;

/// Failures surfaced by the session manager.
///
/// `InvalidCredentials` and `Transport` leave the session untouched.
/// `SessionExpired` and `NotAuthenticated` mean the session is gone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl SessionError {
    /// Classify a failed login call. Rejections by the backend are bad
    /// credentials; anything else is a transport problem.
    pub fn from_login_failure(err: &ApiError) -> Self {
        match err {
            ApiError::Unauthorized | ApiError::BadRequest(_) | ApiError::Validation(_) => {
                SessionError::InvalidCredentials(err.to_string())
            }
            _ => SessionError::Transport(err.to_string()),
        }
    }

    /// True when the session was terminated and the user must log in again
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionError::NotAuthenticated | SessionError::SessionExpired(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failure_classification() {
        assert!(matches!(
            SessionError::from_login_failure(&ApiError::Unauthorized),
            SessionError::InvalidCredentials(_)
        ));
        assert!(matches!(
            SessionError::from_login_failure(&ApiError::BadRequest("detail".into())),
            SessionError::InvalidCredentials(_)
        ));
        assert!(matches!(
            SessionError::from_login_failure(&ApiError::ServerError("boom".into())),
            SessionError::Transport(_)
        ));
        assert!(matches!(
            SessionError::from_login_failure(&ApiError::InvalidResponse("html".into())),
            SessionError::Transport(_)
        ));
    }

    #[test]
    fn test_is_terminal() {
        assert!(SessionError::NotAuthenticated.is_terminal());
        assert!(SessionError::SessionExpired("x".into()).is_terminal());
        assert!(!SessionError::InvalidCredentials("x".into()).is_terminal());
        assert!(!SessionError::Transport("x".into()).is_terminal());
    }
}
