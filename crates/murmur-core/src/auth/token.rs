//! JWT credential pair and the identity derived from it.
//!
//! The client never verifies signatures; it only reads the payload to learn
//! who is logged in and when the access token expires.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Access + refresh token pair as issued by the backend.
///
/// Serialized form is exactly what the token endpoint returns:
/// `{"access": "...", "refresh": "..."}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

// Tokens are bearer secrets; keep them out of logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not a three-part JWT")]
    Malformed,

    #[error("token payload is not valid base64url: {0}")]
    Encoding(String),

    #[error("token payload is not valid JSON: {0}")]
    Payload(String),

    #[error("token payload has no subject")]
    MissingSubject,

    #[error("token expiry is out of range")]
    InvalidExpiry,
}

/// Claims carried in an access token payload.
///
/// SimpleJWT puts the user's primary key in `user_id`; other issuers use
/// `sub`. Either may be a number or a string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub exp: i64,
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub sub: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
}

impl AccessClaims {
    /// Decode the payload segment of a JWT without verifying it
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let mut parts = token.split('.');
        let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
            _ => return Err(TokenError::Malformed),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))
    }

    /// Numeric subject id, preferring `user_id` over `sub`
    pub fn subject_id(&self) -> Option<i64> {
        self.user_id
            .as_ref()
            .and_then(value_as_i64)
            .or_else(|| self.sub.as_ref().and_then(value_as_i64))
    }

    pub fn expires_at(&self) -> Result<DateTime<Utc>, TokenError> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .ok_or(TokenError::InvalidExpiry)
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Who is logged in, derived from the current access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Identity {
    pub fn from_access_token(token: &str) -> Result<Self, TokenError> {
        let claims = AccessClaims::decode(token)?;
        let user_id = claims.subject_id().ok_or(TokenError::MissingSubject)?;
        let expires_at = claims.expires_at()?;
        Ok(Self {
            user_id,
            email: claims.email,
            name: claims.name,
            expires_at,
        })
    }

    /// Time left before the access token expires (negative once expired)
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// True when the token expires within `margin` of `now`
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        self.time_until_expiry(now) <= margin
    }

    /// Best display label: name, then email, then the numeric id
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| format!("user #{}", self.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token(payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_identity_from_simplejwt_token() {
        let exp = Utc::now().timestamp() + 3600;
        let t = token(json!({"token_type": "access", "exp": exp, "jti": "abc", "user_id": 42}));

        let identity = Identity::from_access_token(&t).expect("token should decode");
        assert_eq!(identity.user_id, 42);
        assert_eq!(identity.expires_at.timestamp(), exp);
        assert_eq!(identity.display_name(), "user #42");
    }

    #[test]
    fn test_subject_falls_back_to_sub_string() {
        let t = token(json!({"exp": 1_900_000_000, "sub": "17", "email": "a@x.com"}));
        let identity = Identity::from_access_token(&t).unwrap();
        assert_eq!(identity.user_id, 17);
        assert_eq!(identity.display_name(), "a@x.com");
    }

    #[test]
    fn test_user_id_as_string() {
        let t = token(json!({"exp": 1_900_000_000, "user_id": "7", "name": "Ada"}));
        let identity = Identity::from_access_token(&t).unwrap();
        assert_eq!(identity.user_id, 7);
        assert_eq!(identity.display_name(), "Ada");
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let body = URL_SAFE_NO_PAD.encode(json!({"exp": 1_900_000_000, "user_id": 1}).to_string());
        let t = format!("{}.{}==.sig", header, body);
        assert!(Identity::from_access_token(&t).is_ok());
    }

    #[test]
    fn test_malformed_tokens() {
        assert_eq!(AccessClaims::decode("").unwrap_err(), TokenError::Malformed);
        assert_eq!(AccessClaims::decode("a.b").unwrap_err(), TokenError::Malformed);
        assert_eq!(AccessClaims::decode("a.b.c.d").unwrap_err(), TokenError::Malformed);
        assert!(matches!(AccessClaims::decode("a.!!!.c"), Err(TokenError::Encoding(_))));

        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode(b"not json"));
        assert!(matches!(AccessClaims::decode(&not_json), Err(TokenError::Payload(_))));
    }

    #[test]
    fn test_missing_subject() {
        let t = token(json!({"exp": 1_900_000_000}));
        assert_eq!(Identity::from_access_token(&t).unwrap_err(), TokenError::MissingSubject);
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let identity = Identity {
            user_id: 1,
            email: None,
            name: None,
            expires_at: now + Duration::seconds(30),
        };
        assert!(identity.expires_within(Duration::minutes(2), now));
        assert!(!identity.expires_within(Duration::seconds(10), now));
    }

    #[test]
    fn test_credential_pair_debug_is_redacted() {
        let pair = CredentialPair {
            access: "secret-access".into(),
            refresh: "secret-refresh".into(),
        };
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret"));
    }
}
