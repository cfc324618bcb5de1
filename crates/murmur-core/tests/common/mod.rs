//! Shared fixtures: JWT minting, an in-process auth backend double, and an
//! axum server faking the REST backend.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::body::Bytes;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use murmur_core::api::ApiError;
use murmur_core::auth::{AuthBackend, CredentialPair, RenewedTokens};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const USER_ID: i64 = 42;
pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "correct horse";

static JTI: AtomicU64 = AtomicU64::new(1);

/// Unsigned JWT for `user_id` expiring `ttl_secs` from now
pub fn mint_token(user_id: i64, ttl_secs: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = json!({
        "token_type": "access",
        "exp": Utc::now().timestamp() + ttl_secs,
        "user_id": user_id,
        "email": EMAIL,
        "jti": format!("jti-{}", JTI.fetch_add(1, Ordering::SeqCst)),
    });
    let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, payload)
}

pub fn mint_refresh() -> String {
    format!("refresh-{}", JTI.fetch_add(1, Ordering::SeqCst))
}

// ===== Auth backend double =====

pub struct FakeAuthBackend {
    /// Lifetime of access tokens issued by login
    pub login_ttl: AtomicI64,
    /// Lifetime of access tokens issued by renewal
    pub renew_ttl: AtomicI64,
    pub reject_renewal: AtomicBool,
    pub rotate_refresh: AtomicBool,
    pub obtain_calls: AtomicUsize,
    pub renew_calls: AtomicUsize,
    /// Notified when a renewal call starts
    pub renew_entered: Notify,
    /// When set, renewal waits for this before answering
    gate: Option<Arc<Notify>>,
}

impl FakeAuthBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    /// Renewals block until `gate` is notified
    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self::build(Some(gate)))
    }

    fn build(gate: Option<Arc<Notify>>) -> Self {
        Self {
            login_ttl: AtomicI64::new(3600),
            renew_ttl: AtomicI64::new(3600),
            reject_renewal: AtomicBool::new(false),
            rotate_refresh: AtomicBool::new(false),
            obtain_calls: AtomicUsize::new(0),
            renew_calls: AtomicUsize::new(0),
            renew_entered: Notify::new(),
            gate,
        }
    }

    pub fn obtains(&self) -> usize {
        self.obtain_calls.load(Ordering::SeqCst)
    }

    pub fn renewals(&self) -> usize {
        self.renew_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthBackend for FakeAuthBackend {
    async fn obtain(&self, email: &str, password: &str) -> Result<CredentialPair, ApiError> {
        self.obtain_calls.fetch_add(1, Ordering::SeqCst);
        if email != EMAIL || password != PASSWORD {
            return Err(ApiError::Unauthorized);
        }
        Ok(CredentialPair {
            access: mint_token(USER_ID, self.login_ttl.load(Ordering::SeqCst)),
            refresh: mint_refresh(),
        })
    }

    async fn renew(&self, _refresh: &str) -> Result<RenewedTokens, ApiError> {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        self.renew_entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.reject_renewal.load(Ordering::SeqCst) {
            return Err(ApiError::Unauthorized);
        }
        Ok(RenewedTokens {
            access: mint_token(USER_ID, self.renew_ttl.load(Ordering::SeqCst)),
            refresh: self
                .rotate_refresh
                .load(Ordering::SeqCst)
                .then(mint_refresh),
        })
    }
}

// ===== Fake REST backend =====

#[derive(Default)]
pub struct ServerState {
    /// The only access token protected routes accept
    pub valid_access: Mutex<Option<String>>,
    pub refresh_fails: AtomicBool,
    /// Protected routes answer 401 whatever the token
    pub reject_all: AtomicBool,
    pub search_fails: AtomicBool,
    pub following: AtomicBool,
    pub rate_limit_remaining: AtomicUsize,
    pub feed_hits: AtomicUsize,
    pub refresh_hits: AtomicUsize,
    pub auth_headers: Mutex<Vec<Option<String>>>,
    /// Content type and raw body of the last profile update
    pub last_upload: Mutex<Option<(String, Vec<u8>)>>,
}

impl ServerState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Invalidate whatever access token the client holds
    pub fn expire_access(&self) {
        if let Ok(mut valid) = self.valid_access.lock() {
            *valid = Some("revoked".to_string());
        }
    }

    pub fn feed_hits(&self) -> usize {
        self.feed_hits.load(Ordering::SeqCst)
    }

    pub fn refresh_hits(&self) -> usize {
        self.refresh_hits.load(Ordering::SeqCst)
    }

    pub fn last_auth_header(&self) -> Option<String> {
        self.auth_headers
            .lock()
            .ok()
            .and_then(|h| h.last().cloned())
            .flatten()
    }

    fn record(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Ok(mut seen) = self.auth_headers.lock() {
            seen.push(value.clone());
        }
        value
    }

    fn issue(&self) -> String {
        let access = mint_token(USER_ID, 3600);
        if let Ok(mut valid) = self.valid_access.lock() {
            *valid = Some(access.clone());
        }
        access
    }

    /// Check the bearer header like the backend's JWT authentication does
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let header = self.record(headers);
        let presented = header.as_deref().and_then(|h| h.strip_prefix("Bearer "));
        let valid = self.valid_access.lock().ok().and_then(|v| v.clone());
        if self.reject_all.load(Ordering::SeqCst) || presented.is_none() || presented != valid.as_deref() {
            return Err(unauthorized());
        }
        Ok(())
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Given token not valid for any token type", "code": "token_not_valid"})),
    )
        .into_response()
}

pub fn sample_posts() -> Value {
    json!([
        {"id": 1, "user": USER_ID, "user_id": USER_ID, "user_name": "Ada", "content": "Hello murmur",
         "image": null, "created_at": "2024-05-01T10:00:00Z", "like_count": 1, "comment_count": 0,
         "is_liked": false, "comments": []},
        {"id": 2, "user": 7, "user_id": 7, "user_name": "Grace", "content": "Compilers",
         "image": null, "created_at": "2024-05-01T09:00:00Z", "like_count": 0, "comment_count": 0,
         "is_liked": false, "comments": []}
    ])
}

pub fn sample_users() -> Value {
    json!([
        {"id": 7, "name": "Grace Hopper", "email": "grace@example.com", "profile_picture_url": null, "bio": "Compilers"},
        {"id": 8, "name": "Alan Turing", "email": "alan@example.com", "profile_picture_url": null, "bio": "Machines"}
    ])
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshBody {
    refresh: String,
}

#[derive(Deserialize)]
struct ListQuery {
    q: Option<String>,
    user: Option<i64>,
}

async fn token(State(state): State<Arc<ServerState>>, Json(body): Json<LoginBody>) -> Response {
    if body.email != EMAIL || body.password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response();
    }
    Json(json!({"access": state.issue(), "refresh": mint_refresh()})).into_response()
}

async fn token_refresh(State(state): State<Arc<ServerState>>, Json(body): Json<RefreshBody>) -> Response {
    state.refresh_hits.fetch_add(1, Ordering::SeqCst);
    if state.refresh_fails.load(Ordering::SeqCst) || body.refresh.is_empty() {
        return unauthorized();
    }
    Json(json!({"access": state.issue()})).into_response()
}

async fn posts(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Response {
    state.feed_hits.fetch_add(1, Ordering::SeqCst);
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    if state
        .rate_limit_remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
    {
        return (StatusCode::TOO_MANY_REQUESTS, Json(json!({"detail": "Request was throttled."})))
            .into_response();
    }
    if query.user.is_some() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "filter unsupported").into_response();
    }
    let mut items = sample_posts();
    if let (Some(q), Some(list)) = (query.q, items.as_array_mut()) {
        let q = q.to_lowercase();
        list.retain(|p| p["content"].as_str().unwrap_or("").to_lowercase().contains(&q));
    }
    let count = items.as_array().map(|a| a.len()).unwrap_or(0);
    Json(json!({"count": count, "next": null, "previous": null, "results": items})).into_response()
}

async fn create_post(State(state): State<Arc<ServerState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let content = body["content"].as_str().unwrap_or("");
    if content.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"content": ["This field may not be blank."]})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({"id": 3, "user_id": USER_ID, "user_name": "Ada", "content": content,
                    "like_count": 0, "comment_count": 0, "is_liked": false, "comments": []})),
    )
        .into_response()
}

async fn toggle_like(State(state): State<Arc<ServerState>>, headers: HeaderMap, Path(_id): Path<i64>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(json!({"liked": true, "like_count": 2})).into_response()
}

async fn follow(State(state): State<Arc<ServerState>>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    if id == USER_ID {
        return (StatusCode::BAD_REQUEST, Json(json!({"detail": "You cannot follow yourself."})))
            .into_response();
    }
    let was_following = state.following.fetch_xor(true, Ordering::SeqCst);
    if was_following {
        (StatusCode::OK, Json(json!({"detail": "Unfollowed Grace."}))).into_response()
    } else {
        (StatusCode::CREATED, Json(json!({"detail": "Now following Grace."}))).into_response()
    }
}

async fn suggestions(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(sample_users()).into_response()
}

async fn user_search(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Response {
    state.record(&headers);
    if state.search_fails.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "search index offline").into_response();
    }
    let q = query.q.unwrap_or_default().to_lowercase();
    let mut users = sample_users();
    if let Some(list) = users.as_array_mut() {
        list.retain(|u| u["name"].as_str().unwrap_or("").to_lowercase().contains(&q));
    }
    let count = users.as_array().map(|a| a.len()).unwrap_or(0);
    Json(json!({"query": q, "count": count, "results": {"count": count, "next": null, "previous": null, "results": users}}))
        .into_response()
}

async fn profiles(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(json!({"count": 2, "next": null, "previous": null, "results": sample_users()})).into_response()
}

async fn update_me(State(state): State<Arc<ServerState>>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    *state.last_upload.lock().unwrap() = Some((content_type, body.to_vec()));
    Json(json!({"detail": "Profile updated successfully.", "user": {"id": USER_ID, "name": "Ada"}})).into_response()
}

/// Start the fake backend on an ephemeral port; returns its API base URL
pub async fn spawn_server(state: Arc<ServerState>) -> String {
    let app = Router::new()
        .route("/api/token/", post(token))
        .route("/api/token/refresh/", post(token_refresh))
        .route("/api/posts/", get(posts).post(create_post))
        .route("/api/posts/{id}/toggle_like/", post(toggle_like))
        .route("/api/users/{id}/follow/", post(follow))
        .route("/api/users/suggestions/", get(suggestions))
        .route("/api/users/search/", get(user_search))
        .route("/api/users/profiles/", get(profiles))
        .route("/api/users/profiles/me/", patch(update_me))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/api/", addr)
}
