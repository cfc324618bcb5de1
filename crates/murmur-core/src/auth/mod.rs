//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `CredentialPair` / `Identity`: the JWT pair and the identity decoded
//!   from its access token
//! - `TokenStore`: single-key persistence of the pair (file, keychain, memory)
//! - `AuthBackend`: the credential issue and renewal endpoints
//! - `SessionManager`: owns the pair, refreshes it proactively on a timer and
//!   reactively when the transport reports a 401

pub mod backend;
pub mod credentials;
pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use backend::{AuthBackend, HttpAuthBackend, RenewedTokens};
pub use credentials::KeyringTokenStore;
pub use error::SessionError;
pub use session::{SessionManager, SessionSettings};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{AccessClaims, CredentialPair, Identity, TokenError};
