//! Data models for the social networking backend.
//!
//! - `Post`, `Comment`, `LikeToggle`: the feed
//! - `UserProfile`, `UserSummary`, `FollowStatus`: people and the follow graph
//! - `Page`: the paginated list envelope
//! - Request bodies: `NewPost`, `NewComment`, `ProfileUpdate`, `Registration`

pub mod page;
pub mod post;
pub mod user;

pub use page::Page;
pub use post::{Comment, LikeToggle, NewComment, NewPost, Post};
pub use user::{FollowStatus, ProfileUpdate, Registration, UserProfile, UserSummary};
