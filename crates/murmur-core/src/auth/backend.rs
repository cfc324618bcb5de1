//! Credential issue and renewal endpoints.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::token::CredentialPair;
use crate::api::ApiError;

/// Result of a renewal call. The backend only returns a new refresh token
/// when it rotates them.
#[derive(Debug, Clone, Deserialize)]
pub struct RenewedTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// The two calls the session manager makes to the backend.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange email and password for a credential pair
    async fn obtain(&self, email: &str, password: &str) -> Result<CredentialPair, ApiError>;

    /// Exchange a refresh token for a new access token
    async fn renew(&self, refresh: &str) -> Result<RenewedTokens, ApiError>;
}

#[derive(Serialize)]
struct ObtainRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RenewRequest<'a> {
    refresh: &'a str,
}

/// `AuthBackend` over the SimpleJWT endpoints `token/` and `token/refresh/`.
#[derive(Clone)]
pub struct HttpAuthBackend {
    client: Client,
    base_url: String,
}

impl HttpAuthBackend {
    /// `base_url` must end with a slash (see `config::normalize_base_url`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Share an existing connection pool
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn obtain(&self, email: &str, password: &str) -> Result<CredentialPair, ApiError> {
        let url = self.url("token/");
        debug!(url = %url, "Requesting credential pair");

        let response = self
            .client
            .post(&url)
            .json(&ObtainRequest { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("token response: {}", e)))
    }

    async fn renew(&self, refresh: &str) -> Result<RenewedTokens, ApiError> {
        let url = self.url("token/refresh/");
        debug!(url = %url, "Renewing access token");

        let response = self
            .client
            .post(&url)
            .json(&RenewRequest { refresh })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("refresh response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renewed_tokens_without_rotation() {
        let renewed: RenewedTokens = serde_json::from_str(r#"{"access": "x.y.z"}"#).unwrap();
        assert_eq!(renewed.access, "x.y.z");
        assert!(renewed.refresh.is_none());
    }

    #[test]
    fn test_renewed_tokens_with_rotation() {
        let renewed: RenewedTokens =
            serde_json::from_str(r#"{"access": "x.y.z", "refresh": "r.s.t"}"#).unwrap();
        assert_eq!(renewed.refresh.as_deref(), Some("r.s.t"));
    }

    #[test]
    fn test_url_joining() {
        let backend = HttpAuthBackend::with_client(Client::new(), "http://localhost:8000/api/");
        assert_eq!(backend.url("token/"), "http://localhost:8000/api/token/");
    }
}
