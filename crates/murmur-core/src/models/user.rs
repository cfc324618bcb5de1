use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

/// Full profile from `users/profiles/{id}/` and `users/profiles/me/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    #[serde(default)]
    pub date_joined: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_following: bool,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
}

impl UserProfile {
    pub fn bio_text(&self) -> &str {
        self.bio.as_deref().unwrap_or("")
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            profile_picture_url: self.profile_picture_url.clone(),
            bio: self.bio.clone(),
        }
    }
}

/// Compact user as returned by search, suggestions and follower lists
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_picture_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

impl UserSummary {
    /// Case-insensitive match on name, email or bio
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        contains_ignore_case(&self.name, query)
            || self
                .email
                .as_deref()
                .is_some_and(|e| contains_ignore_case(e, query))
            || self
                .bio
                .as_deref()
                .is_some_and(|b| contains_ignore_case(b, query))
    }
}

/// Response of `users/{id}/status/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FollowStatus {
    pub is_following: bool,
    #[serde(alias = "user_id")]
    pub target_user_id: i64,
    #[serde(default, alias = "user_name")]
    pub target_user_name: String,
}

/// Partial profile update; unset fields are not sent
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.bio.is_none()
    }
}

#[derive(Clone, Serialize)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub password: String,
    pub password_confirm: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
