//! API client for the social networking REST backend.
//!
//! Every request goes through `ApiClient::send`, which attaches the session's
//! bearer token, renews the session and reissues the request once when the
//! backend answers 401, and backs off on 429.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{
    FileTokenStore, HttpAuthBackend, KeyringTokenStore, SessionManager, TokenStore,
};
use crate::config::{Config, TokenStorage};
use crate::models::{
    Comment, FollowStatus, LikeToggle, NewComment, NewPost, Page, Post, ProfileUpdate,
    Registration, UserProfile, UserSummary,
};

use super::normalize::{extract_list, extract_page};
use super::retry::{Attempt, Decision, RetryPolicy};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Maximum bio length accepted by the backend
const MAX_BIO_CHARS: usize = 500;

/// Display names must be between these lengths after trimming
const MIN_NAME_CHARS: usize = 2;
const MAX_NAME_CHARS: usize = 150;

const MIN_PASSWORD_CHARS: usize = 8;

/// Largest profile picture the backend accepts (5 MB)
const MAX_PICTURE_BYTES: u64 = 5 * 1024 * 1024;

const MAX_PICTURE_NAME_CHARS: usize = 100;

/// Accepted picture extensions and the content type sent for each
const PICTURE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
];

/// Result of `toggle_follow`, told apart by the status code (201 vs 200)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    Unfollowed,
}

impl FollowOutcome {
    pub fn is_following(self) -> bool {
        matches!(self, FollowOutcome::Followed)
    }
}

/// Everything the profile screen shows for one user
#[derive(Debug, Clone)]
pub struct ProfileView {
    pub profile: UserProfile,
    /// `None` for the logged-in user's own profile
    pub follow: Option<FollowStatus>,
    pub posts: Vec<Post>,
}

/// API client for the backend.
/// Clone is cheap - reqwest::Client and the session are reference counted.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<SessionManager>,
    retry: RetryPolicy,
}

impl ApiClient {
    /// Create a client over an existing session manager
    pub fn new(base_url: &str, timeout: Duration, session: Arc<SessionManager>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, base_url, session))
    }

    pub fn with_client(client: Client, base_url: &str, session: Arc<SessionManager>) -> Self {
        Self {
            client,
            base_url: crate::config::normalize_base_url(base_url),
            session,
            retry: RetryPolicy::default(),
        }
    }

    /// Build the client, token store and session manager described by `config`.
    /// The session and the transport share one connection pool.
    pub fn connect(config: &Config) -> Result<Self> {
        let base_url = config.base_url();
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let store: Arc<dyn TokenStore> = match config.token_storage {
            TokenStorage::File => Arc::new(FileTokenStore::new(config.cache_dir()?)),
            TokenStorage::Keyring => Arc::new(KeyringTokenStore::default()),
        };
        let backend = Arc::new(HttpAuthBackend::with_client(client.clone(), &base_url));
        let session = SessionManager::new(backend, store);

        Ok(Self::with_client(client, &base_url, session))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Transport =====

    /// Issue a request built by `build`, rebuilding it for every retry.
    ///
    /// A 401 renews the session and reissues once; a second 401, or a failed
    /// renewal, surfaces `ApiError::Unauthorized`.
    async fn send<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let mut attempt = Attempt::first();

        loop {
            let mut request = build(&self.client, url);
            if let Some(token) = self.session.access_token() {
                request = request.bearer_auth(token);
            }

            let response = request
                .send()
                .await
                .map_err(ApiError::NetworkError)
                .with_context(|| format!("Failed to send request to {}", url))?;

            let status = response.status();
            match self.retry.decide(status, attempt) {
                Decision::Accept => return Ok(response),
                Decision::RefreshAndRetry => {
                    debug!(url = url, "Unauthorized, renewing session before retry");
                    if let Err(e) = self.session.refresh().await {
                        debug!(url = url, error = %e, "Session renewal failed");
                        return Err(ApiError::Unauthorized.into());
                    }
                    attempt = attempt.after_refresh();
                }
                Decision::Backoff(delay) => {
                    warn!(
                        url = url,
                        retry = attempt.rate_limit_retries + 1,
                        backoff_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempt.after_backoff();
                }
                Decision::Fail => {
                    let err = ApiError::from_response(response).await;
                    debug!(url = url, status = status.as_u16(), error = %err, "Request failed");
                    return Err(err.into());
                }
            }
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response, url: &str) -> Result<T> {
        let text = response
            .text()
            .await
            .map_err(ApiError::NetworkError)
            .with_context(|| format!("Failed to read response body from {}", url))?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("unexpected body from {}: {}", url, e)).into()
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        let response = self.send(&url, |c, u| c.get(u)).await?;
        Self::decode(response, &url).await
    }

    async fn get_query<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        let response = self.send(&url, |c, u| c.get(u).query(query)).await?;
        Self::decode(response, &url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let response = self.send(&url, |c, u| c.post(u).json(body)).await?;
        Self::decode(response, &url).await
    }

    async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path);
        let response = self.send(&url, |c, u| c.patch(u).json(body)).await?;
        Self::decode(response, &url).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.send(&url, |c, u| c.delete(u)).await?;
        Ok(())
    }

    // ===== Accounts =====

    /// Create an account. Does not log in.
    pub async fn register(&self, registration: &Registration) -> Result<UserProfile> {
        validate_registration(registration)?;
        let body: Value = self.post("users/register/", registration).await?;
        info!(email = %registration.email, "Registered new account");
        profile_from_envelope(body)
    }

    // ===== Posts =====

    /// Posts from followed users and the user's own, newest first
    pub async fn fetch_feed(&self) -> Result<Vec<Post>> {
        let body: Value = self.get("posts/").await?;
        Ok(extract_list(body))
    }

    pub async fn fetch_feed_page(&self, page: u32) -> Result<Page<Post>> {
        let page = page.max(1).to_string();
        let body: Value = self.get_query("posts/", &[("page", page.as_str())]).await?;
        Ok(extract_page(body))
    }

    /// Posts written by one user. Falls back to filtering the feed locally
    /// when the filtered listing fails.
    pub async fn fetch_user_posts(&self, user_id: i64) -> Result<Vec<Post>> {
        let id = user_id.to_string();
        let mut posts = match self.get_query::<Value>("posts/", &[("user", id.as_str())]).await {
            Ok(body) => extract_list::<Post>(body),
            Err(e) => {
                if is_auth_error(&e) {
                    return Err(e);
                }
                warn!(user_id, error = %e, "User post listing failed, filtering the feed instead");
                self.fetch_feed().await?
            }
        };
        posts.retain(|p| p.user_id == user_id);
        Ok(posts)
    }

    pub async fn search_posts(&self, query: &str) -> Result<Vec<Post>> {
        let body: Value = self.get_query("posts/", &[("q", query.trim())]).await?;
        Ok(extract_list(body))
    }

    pub async fn create_post(&self, content: &str) -> Result<Post> {
        let content = validate_post_content(content)?;
        let post: Post = self.post("posts/", &NewPost { content }).await?;
        debug!(post_id = post.id, "Created post");
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: i64) -> Result<()> {
        self.delete(&format!("posts/{}/", post_id)).await?;
        debug!(post_id, "Deleted post");
        Ok(())
    }

    pub async fn toggle_like(&self, post_id: i64) -> Result<LikeToggle> {
        let url = self.url(&format!("posts/{}/toggle_like/", post_id));
        let response = self.send(&url, |c, u| c.post(u)).await?;
        Self::decode(response, &url).await
    }

    pub async fn add_comment(&self, post_id: i64, text: &str) -> Result<Comment> {
        let text = validate_comment(text)?;
        self.post(&format!("posts/{}/comment/", post_id), &NewComment { text })
            .await
    }

    // ===== Profiles =====

    pub async fn fetch_profile(&self, user_id: i64) -> Result<UserProfile> {
        self.get(&format!("users/profiles/{}/", user_id)).await
    }

    pub async fn fetch_my_profile(&self) -> Result<UserProfile> {
        self.get("users/profiles/me/").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile> {
        if update.is_empty() {
            return Err(ApiError::Validation("Nothing to update".to_string()).into());
        }
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(bio) = &update.bio {
            validate_bio(bio)?;
        }
        let body: Value = self.patch("users/profiles/me/", update).await?;
        profile_from_envelope(body)
    }

    /// Upload a new profile picture from a local file
    pub async fn upload_profile_picture(&self, path: &Path) -> Result<UserProfile> {
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mime = validate_picture(path, metadata.len())?;
        let content_type = HeaderValue::from_str(mime)
            .with_context(|| format!("Invalid picture content type {}", mime))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let url = self.url("users/profiles/me/");
        let response = self
            .send(&url, |c, u| {
                c.patch(u)
                    .multipart(picture_form(bytes.clone(), file_name.clone(), &content_type))
            })
            .await?;
        let body: Value = Self::decode(response, &url).await?;
        info!(file = %file_name, "Uploaded profile picture");
        profile_from_envelope(body)
    }

    /// Profile, follow status and posts of one user, fetched concurrently
    pub async fn fetch_profile_view(&self, user_id: i64) -> Result<ProfileView> {
        let own = self
            .session
            .identity()
            .is_some_and(|identity| identity.user_id == user_id);

        let (profile, follow, posts) = tokio::join!(
            self.fetch_profile(user_id),
            async {
                if own {
                    None
                } else {
                    Some(self.follow_status(user_id).await)
                }
            },
            self.fetch_user_posts(user_id),
        );

        let profile = profile?;
        let follow = match follow {
            Some(Ok(status)) => Some(status),
            Some(Err(e)) => {
                warn!(user_id, error = %e, "Failed to fetch follow status");
                Some(FollowStatus {
                    is_following: profile.is_following,
                    target_user_id: profile.id,
                    target_user_name: profile.name.clone(),
                })
            }
            None => None,
        };
        let posts = posts.unwrap_or_else(|e| {
            warn!(user_id, error = %e, "Failed to fetch user posts");
            Vec::new()
        });

        Ok(ProfileView {
            profile,
            follow,
            posts,
        })
    }

    // ===== Follow graph =====

    pub async fn follow_status(&self, user_id: i64) -> Result<FollowStatus> {
        self.get(&format!("users/{}/status/", user_id)).await
    }

    /// Follow the user, or unfollow if already following
    pub async fn toggle_follow(&self, user_id: i64) -> Result<FollowOutcome> {
        let url = self.url(&format!("users/{}/follow/", user_id));
        let response = self.send(&url, |c, u| c.post(u)).await?;
        let outcome = if response.status() == StatusCode::CREATED {
            FollowOutcome::Followed
        } else {
            FollowOutcome::Unfollowed
        };
        debug!(user_id, ?outcome, "Toggled follow");
        Ok(outcome)
    }

    pub async fn fetch_followers(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        let body: Value = self
            .get(&format!("users/profiles/{}/followers/", user_id))
            .await?;
        Ok(extract_list(body))
    }

    pub async fn fetch_following(&self, user_id: i64) -> Result<Vec<UserSummary>> {
        let body: Value = self
            .get(&format!("users/profiles/{}/following/", user_id))
            .await?;
        Ok(extract_list(body))
    }

    /// Followers and followed users in one round trip
    pub async fn fetch_connections(&self, user_id: i64) -> Result<(Vec<UserSummary>, Vec<UserSummary>)> {
        futures::future::try_join(self.fetch_followers(user_id), self.fetch_following(user_id)).await
    }

    pub async fn fetch_suggestions(&self) -> Result<Vec<UserSummary>> {
        let body: Value = self.get("users/suggestions/").await?;
        Ok(extract_list(body))
    }

    /// Search users by name, email or bio. Falls back to filtering the full
    /// profile listing locally when the search endpoint fails.
    pub async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>> {
        let query = query.trim();
        match self.get_query::<Value>("users/search/", &[("q", query)]).await {
            Ok(body) => Ok(extract_list(body)),
            Err(e) => {
                if is_auth_error(&e) {
                    return Err(e);
                }
                warn!(error = %e, "User search failed, filtering profiles locally");
                let body: Value = self.get("users/profiles/").await?;
                let mut users: Vec<UserSummary> = extract_list(body);
                users.retain(|u| u.matches(query));
                Ok(users)
            }
        }
    }
}

// ===== Helpers =====

fn is_auth_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_some_and(ApiError::is_auth_failure)
}

/// Registration and profile updates answer `{detail, user}`; accept a bare
/// profile too.
fn profile_from_envelope(mut body: Value) -> Result<UserProfile> {
    let profile = if body.get("user").is_some() {
        body["user"].take()
    } else {
        body
    };
    serde_json::from_value(profile)
        .map_err(|e| ApiError::InvalidResponse(format!("profile response: {}", e)).into())
}

fn picture_form(bytes: Vec<u8>, file_name: String, content_type: &HeaderValue) -> Form {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, content_type.clone());
    let part = Part::bytes(bytes).file_name(file_name).headers(headers);
    Form::new().part("profile_picture", part)
}

/// Keep posts whose content or author name contains `query`, ignoring case.
/// An empty query keeps everything.
pub fn filter_posts<'a>(posts: &'a [Post], query: &str) -> Vec<&'a Post> {
    posts.iter().filter(|p| p.matches(query)).collect()
}

// ===== Validation =====

pub fn validate_post_content(content: &str) -> Result<&str, ApiError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::Validation("Post content cannot be empty".to_string()));
    }
    Ok(content)
}

pub fn validate_comment(text: &str) -> Result<&str, ApiError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::Validation("Comment text cannot be empty".to_string()));
    }
    Ok(text)
}

pub fn validate_bio(bio: &str) -> Result<(), ApiError> {
    if bio.chars().count() > MAX_BIO_CHARS {
        return Err(ApiError::Validation(format!(
            "Bio cannot exceed {} characters",
            MAX_BIO_CHARS
        )));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().chars().count();
    if len < MIN_NAME_CHARS {
        return Err(ApiError::Validation(format!(
            "Name must be at least {} characters long",
            MIN_NAME_CHARS
        )));
    }
    if len > MAX_NAME_CHARS {
        return Err(ApiError::Validation(format!(
            "Name cannot exceed {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(())
}

pub fn validate_registration(registration: &Registration) -> Result<(), ApiError> {
    let email = registration.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("Enter a valid email address".to_string()));
    }
    validate_name(&registration.name)?;
    if registration.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_CHARS
        )));
    }
    if registration.password != registration.password_confirm {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}

/// Check a picture's extension, name and size. Returns its content type.
pub fn validate_picture(path: &Path, size: u64) -> Result<&'static str, ApiError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let mime = PICTURE_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
        .ok_or_else(|| {
            ApiError::Validation(
                "Unsupported file format. Supported formats: jpg, jpeg, png, gif, webp".to_string(),
            )
        })?;

    let name_len = path
        .file_name()
        .map(|n| n.to_string_lossy().chars().count())
        .unwrap_or(0);
    if name_len > MAX_PICTURE_NAME_CHARS {
        return Err(ApiError::Validation("File name too long".to_string()));
    }
    if size > MAX_PICTURE_BYTES {
        return Err(ApiError::Validation(format!(
            "File size too large. Maximum size is {}MB",
            MAX_PICTURE_BYTES / 1024 / 1024
        )));
    }
    Ok(mime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(id: i64, user_name: &str, content: &str) -> Post {
        serde_json::from_value(json!({
            "id": id, "user_id": id, "user_name": user_name, "content": content
        }))
        .unwrap()
    }

    #[test]
    fn test_filter_posts() {
        let posts = vec![
            post(1, "Ada", "Engines and notes"),
            post(2, "Grace", "Compilers all the way down"),
            post(3, "Linus", "Kernel patches"),
        ];
        assert_eq!(filter_posts(&posts, "").len(), 3);
        let hits: Vec<i64> = filter_posts(&posts, "COMPILER").iter().map(|p| p.id).collect();
        assert_eq!(hits, vec![2]);
        let hits: Vec<i64> = filter_posts(&posts, "linus").iter().map(|p| p.id).collect();
        assert_eq!(hits, vec![3]);
        assert!(filter_posts(&posts, "cobol").is_empty());
    }

    #[test]
    fn test_validate_post_content() {
        assert_eq!(validate_post_content("  hello  ").unwrap(), "hello");
        assert!(matches!(validate_post_content("   "), Err(ApiError::Validation(_))));
        assert!(matches!(validate_comment("\n\t"), Err(ApiError::Validation(_))));
        assert_eq!(validate_comment(" nice ").unwrap(), "nice");
    }

    #[test]
    fn test_validate_bio_counts_chars() {
        assert!(validate_bio(&"a".repeat(500)).is_ok());
        assert!(validate_bio(&"a".repeat(501)).is_err());
        assert!(validate_bio(&"é".repeat(500)).is_ok());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Al").is_ok());
        assert!(validate_name(" A ").is_err());
        assert!(validate_name(&"n".repeat(151)).is_err());
    }

    #[test]
    fn test_validate_registration() {
        let mut reg = Registration {
            email: "ada@example.com".into(),
            name: "Ada".into(),
            password: "correct horse".into(),
            password_confirm: "correct horse".into(),
        };
        assert!(validate_registration(&reg).is_ok());

        reg.password_confirm = "battery staple".into();
        assert!(validate_registration(&reg).is_err());

        reg.password = "short".into();
        reg.password_confirm = "short".into();
        assert!(validate_registration(&reg).is_err());

        reg.password = "long enough".into();
        reg.password_confirm = "long enough".into();
        reg.email = "not-an-email".into();
        assert!(validate_registration(&reg).is_err());
    }

    #[test]
    fn test_validate_picture() {
        assert_eq!(validate_picture(Path::new("me.PNG"), 1024).unwrap(), "image/png");
        assert_eq!(validate_picture(Path::new("/tmp/a.jpg"), 10).unwrap(), "image/jpeg");
        assert_eq!(validate_picture(Path::new("a.webp"), 10).unwrap(), "image/webp");
        assert!(validate_picture(Path::new("notes.txt"), 10).is_err());
        assert!(validate_picture(Path::new("noext"), 10).is_err());
        assert!(validate_picture(Path::new("big.gif"), MAX_PICTURE_BYTES + 1).is_err());
        assert!(validate_picture(Path::new("big.gif"), MAX_PICTURE_BYTES).is_ok());
        let long = format!("{}.png", "x".repeat(MAX_PICTURE_NAME_CHARS));
        assert!(validate_picture(Path::new(&long), 10).is_err());
    }

    #[test]
    fn test_picture_types_are_valid_content_types() {
        for (extension, mime) in PICTURE_TYPES {
            assert!(
                HeaderValue::from_str(mime).is_ok(),
                "bad content type for .{}",
                extension
            );
        }
    }

    #[test]
    fn test_profile_from_envelope() {
        let wrapped = json!({"detail": "Profile updated successfully.", "user": {"id": 4, "name": "Ada"}});
        assert_eq!(profile_from_envelope(wrapped).unwrap().id, 4);

        let bare = json!({"id": 5, "name": "Grace"});
        assert_eq!(profile_from_envelope(bare).unwrap().name, "Grace");

        assert!(profile_from_envelope(json!({"detail": "odd"})).is_err());
    }

    #[test]
    fn test_follow_outcome() {
        assert!(FollowOutcome::Followed.is_following());
        assert!(!FollowOutcome::Unfollowed.is_following());
    }
}
