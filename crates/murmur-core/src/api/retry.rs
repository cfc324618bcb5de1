//! Retry decisions for the transport.
//!
//! The decision is a pure function of the response status and how many
//! retries of each kind the request has already used. The retry counters
//! travel with the request loop, never with the request itself.

use std::time::Duration;

use reqwest::StatusCode;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Retries already spent on one logical request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attempt {
    /// Reissues after a session refresh. Never exceeds one.
    pub auth_retries: u32,
    pub rate_limit_retries: u32,
}

impl Attempt {
    pub fn first() -> Self {
        Self::default()
    }

    pub fn after_refresh(self) -> Self {
        Self {
            auth_retries: self.auth_retries + 1,
            ..self
        }
    }

    pub fn after_backoff(self) -> Self {
        Self {
            rate_limit_retries: self.rate_limit_retries + 1,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Hand the response to the caller
    Accept,
    /// Renew the session, then reissue the request
    RefreshAndRetry,
    /// Wait, then reissue the request
    Backoff(Duration),
    /// Turn the response into an error
    Fail,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_rate_limit_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: MAX_RATE_LIMIT_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn decide(&self, status: StatusCode, attempt: Attempt) -> Decision {
        if status.is_success() {
            return Decision::Accept;
        }
        match status {
            StatusCode::UNAUTHORIZED if attempt.auth_retries == 0 => Decision::RefreshAndRetry,
            StatusCode::TOO_MANY_REQUESTS
                if attempt.rate_limit_retries < self.max_rate_limit_retries =>
            {
                Decision::Backoff(self.backoff_for(attempt.rate_limit_retries))
            }
            _ => Decision::Fail,
        }
    }

    /// Exponential backoff: initial, 2x, 4x, ...
    fn backoff_for(&self, retries: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_accepted() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(StatusCode::OK, Attempt::first()), Decision::Accept);
        assert_eq!(policy.decide(StatusCode::CREATED, Attempt::first()), Decision::Accept);
        assert_eq!(policy.decide(StatusCode::NO_CONTENT, Attempt::first()), Decision::Accept);
    }

    #[test]
    fn test_unauthorized_retried_once() {
        let policy = RetryPolicy::default();
        let first = Attempt::first();
        assert_eq!(policy.decide(StatusCode::UNAUTHORIZED, first), Decision::RefreshAndRetry);

        let second = first.after_refresh();
        assert_eq!(policy.decide(StatusCode::UNAUTHORIZED, second), Decision::Fail);
    }

    #[test]
    fn test_rate_limit_backoff_doubles() {
        let policy = RetryPolicy::default();
        let mut attempt = Attempt::first();
        let mut delays = Vec::new();
        while let Decision::Backoff(delay) = policy.decide(StatusCode::TOO_MANY_REQUESTS, attempt) {
            delays.push(delay);
            attempt = attempt.after_backoff();
        }
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert_eq!(policy.decide(StatusCode::TOO_MANY_REQUESTS, attempt), Decision::Fail);
    }

    #[test]
    fn test_rate_limit_independent_of_auth_retry() {
        let policy = RetryPolicy::default();
        let attempt = Attempt::first().after_refresh();
        assert!(matches!(
            policy.decide(StatusCode::TOO_MANY_REQUESTS, attempt),
            Decision::Backoff(_)
        ));
    }

    #[test]
    fn test_other_errors_fail() {
        let policy = RetryPolicy::default();
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::INTERNAL_SERVER_ERROR,
        ] {
            assert_eq!(policy.decide(status, Attempt::first()), Decision::Fail);
        }
    }
}
