//! Core library for murmur, a terminal client for a social networking
//! REST backend.
//!
//! - `auth`: credential pair, decoded identity, token storage and the
//!   `SessionManager` that keeps the session alive
//! - `api`: the `ApiClient` transport with bearer injection and
//!   retry-once-on-401, plus response-shape normalization
//! - `models`: posts, comments, profiles and the paginated envelope
//! - `config`: on-disk configuration with environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{CredentialPair, Identity, SessionError, SessionManager};
pub use config::Config;
