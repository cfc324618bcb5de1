//! REST API client module for the social networking backend.
//!
//! This module provides the `ApiClient` transport. It attaches the session's
//! bearer token to every request, renews the session once when a request is
//! rejected with 401, and backs off on 429.
//!
//! Response bodies from list endpoints come in several shapes; `normalize`
//! reduces them to plain item lists in one place.

pub mod client;
pub mod error;
pub mod normalize;
pub mod retry;

pub use client::{
    filter_posts, validate_bio, validate_comment, validate_name, validate_picture,
    validate_post_content, validate_registration, ApiClient, FollowOutcome, ProfileView,
};
pub use error::ApiError;
pub use retry::{Attempt, Decision, RetryPolicy};
