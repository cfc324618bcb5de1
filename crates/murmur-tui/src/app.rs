//! Application state management for murmur.
//!
//! This module contains the core `App` struct that manages all application state,
//! including UI state, loaded data, the session, and background task coordination.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use murmur_core::api::{
    filter_posts, validate_bio, validate_comment, validate_name, validate_post_content,
    ApiClient, ApiError, FollowOutcome, ProfileView,
};
use murmur_core::auth::{Identity, SessionError};
use murmur_core::config::Config;
use murmur_core::models::{
    Comment, LikeToggle, Post, ProfileUpdate, Registration, UserProfile, UserSummary,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for display names.
const MAX_NAME_LENGTH: usize = 150;

/// Maximum length for composed text (posts, comments, bio, paths).
const MAX_COMPOSE_LENGTH: usize = 2000;

/// Maximum length for search and filter queries.
const MAX_QUERY_LENGTH: usize = 100;

/// Number of items to scroll on page up/down.
pub const PAGE_SCROLL_SIZE: usize = 10;

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Feed,
    Search,
    Profile,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Feed => "Feed",
            Tab::Search => "Search",
            Tab::Profile => "Profile",
        }
    }

    /// Get the next tab (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Tab::Feed => Tab::Search,
            Tab::Search => Tab::Profile,
            Tab::Profile => Tab::Feed,
        }
    }

    /// Get the previous tab (wrapping around)
    pub fn prev(&self) -> Self {
        match self {
            Tab::Feed => Tab::Profile,
            Tab::Search => Tab::Feed,
            Tab::Profile => Tab::Search,
        }
    }
}

/// Current UI focus area (list panel or detail panel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Detail,
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    /// Typing a local feed filter
    Filtering,
    /// Typing a search query
    EditingSearch,
    Composing,
    ConfirmingDelete,
    ShowingHelp,
    LoggingIn,
    Registering,
    ConfirmingQuit,
    Quitting,
}

/// Login form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginFocus {
    Email,
    Password,
    Button,
    Register,
}

impl LoginFocus {
    pub fn next(self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Password,
            LoginFocus::Password => LoginFocus::Button,
            LoginFocus::Button => LoginFocus::Register,
            LoginFocus::Register => LoginFocus::Email,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            LoginFocus::Email => LoginFocus::Register,
            LoginFocus::Password => LoginFocus::Email,
            LoginFocus::Button => LoginFocus::Password,
            LoginFocus::Register => LoginFocus::Button,
        }
    }
}

/// Registration form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterFocus {
    Name,
    Email,
    Password,
    Confirm,
    Button,
}

impl RegisterFocus {
    pub fn next(self) -> Self {
        match self {
            RegisterFocus::Name => RegisterFocus::Email,
            RegisterFocus::Email => RegisterFocus::Password,
            RegisterFocus::Password => RegisterFocus::Confirm,
            RegisterFocus::Confirm => RegisterFocus::Button,
            RegisterFocus::Button => RegisterFocus::Name,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            RegisterFocus::Name => RegisterFocus::Button,
            RegisterFocus::Email => RegisterFocus::Name,
            RegisterFocus::Password => RegisterFocus::Email,
            RegisterFocus::Confirm => RegisterFocus::Password,
            RegisterFocus::Button => RegisterFocus::Confirm,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm: String,
    pub focus: RegisterFocus,
    pub error: Option<String>,
}

impl Default for RegisterForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            password: String::new(),
            confirm: String::new(),
            focus: RegisterFocus::Name,
            error: None,
        }
    }
}

impl RegisterForm {
    /// The text field under focus, if any
    pub fn focused_field_mut(&mut self) -> Option<(&mut String, usize)> {
        match self.focus {
            RegisterFocus::Name => Some((&mut self.name, MAX_NAME_LENGTH)),
            RegisterFocus::Email => Some((&mut self.email, MAX_EMAIL_LENGTH)),
            RegisterFocus::Password => Some((&mut self.password, MAX_PASSWORD_LENGTH)),
            RegisterFocus::Confirm => Some((&mut self.confirm, MAX_PASSWORD_LENGTH)),
            RegisterFocus::Button => None,
        }
    }
}

/// What the compose overlay is editing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeKind {
    NewPost,
    Comment { post_id: i64 },
    EditBio,
    EditName,
    PicturePath,
}

impl ComposeKind {
    pub fn title(&self) -> &'static str {
        match self {
            ComposeKind::NewPost => "New post",
            ComposeKind::Comment { .. } => "Add comment",
            ComposeKind::EditBio => "Edit bio",
            ComposeKind::EditName => "Edit name",
            ComposeKind::PicturePath => "Profile picture (file path)",
        }
    }

    pub fn is_multiline(&self) -> bool {
        matches!(self, ComposeKind::NewPost | ComposeKind::EditBio)
    }
}

#[derive(Debug, Clone)]
pub struct Compose {
    pub kind: ComposeKind,
    pub text: String,
    pub error: Option<String>,
}

/// Which list the profile tab shows under the profile card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileList {
    Posts,
    Followers,
    Following,
    Suggestions,
}

impl ProfileList {
    pub fn title(&self) -> &'static str {
        match self {
            ProfileList::Posts => "Posts",
            ProfileList::Followers => "Followers",
            ProfileList::Following => "Following",
            ProfileList::Suggestions => "Suggestions",
        }
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent back from spawned API calls to the main loop.
enum TaskResult {
    Feed(Vec<Post>),
    PostCreated(Post),
    PostDeleted(i64),
    LikeToggled(i64, LikeToggle),
    /// A like toggle failed; the optimistic update must be undone
    LikeFailed(i64, String),
    CommentAdded(i64, Comment),
    SearchResults {
        query: String,
        users: Vec<UserSummary>,
        posts: Vec<Post>,
    },
    Profile(ProfileView),
    ProfileUpdated(UserProfile),
    FollowToggled(i64, FollowOutcome),
    Connections {
        user_id: i64,
        followers: Vec<UserSummary>,
        following: Vec<UserSummary>,
        show: ProfileList,
    },
    Suggestions(Vec<UserSummary>),
    Error(String),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub api: ApiClient,
    identity_rx: watch::Receiver<Option<Identity>>,
    pub identity: Option<Identity>,

    // UI State
    pub state: AppState,
    pub current_tab: Tab,
    pub focus: Focus,

    // Login form state
    pub login_email: String,
    pub login_password: String,
    pub login_focus: LoginFocus,
    pub login_error: Option<String>,

    pub register: RegisterForm,
    pub compose: Option<Compose>,

    // Feed tab
    pub feed: Vec<Post>,
    pub feed_filter: String,
    pub feed_selection: usize,
    pub feed_loading: bool,

    // Search tab
    pub search_query: String,
    pub last_search: Option<String>,
    pub search_users: Vec<UserSummary>,
    pub search_posts: Vec<Post>,
    pub search_user_selection: usize,
    pub search_post_selection: usize,

    // Profile tab
    pub profile: Option<ProfileView>,
    pub profile_list: ProfileList,
    pub profile_selection: usize,
    pub followers: Vec<UserSummary>,
    pub following: Vec<UserSummary>,
    pub suggestions: Vec<UserSummary>,
    pub profile_loading: bool,
    /// Profile most recently asked for; other profile results are stale
    requested_profile: Option<i64>,

    /// Post awaiting delete confirmation
    pub pending_delete: Option<i64>,

    // Background task channel. Results are tagged with the epoch they were
    // spawned in; the epoch moves on whenever user data is cleared.
    task_rx: mpsc::Receiver<(u64, TaskResult)>,
    task_tx: mpsc::Sender<(u64, TaskResult)>,
    epoch: u64,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config, api: ApiClient) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let identity_rx = api.session().subscribe();

        // Get credentials from env vars or config
        let login_email = std::env::var("MURMUR_EMAIL")
            .ok()
            .or_else(|| config.last_email.clone())
            .unwrap_or_default();
        let login_password = std::env::var("MURMUR_PASSWORD").unwrap_or_default();

        Self {
            config,
            api,
            identity_rx,
            identity: None,

            state: AppState::Normal,
            current_tab: Tab::Feed,
            focus: Focus::List,

            login_email,
            login_password,
            login_focus: LoginFocus::Email,
            login_error: None,

            register: RegisterForm::default(),
            compose: None,

            feed: Vec::new(),
            feed_filter: String::new(),
            feed_selection: 0,
            feed_loading: false,

            search_query: String::new(),
            last_search: None,
            search_users: Vec::new(),
            search_posts: Vec::new(),
            search_user_selection: 0,
            search_post_selection: 0,

            profile: None,
            profile_list: ProfileList::Posts,
            profile_selection: 0,
            followers: Vec::new(),
            following: Vec::new(),
            suggestions: Vec::new(),
            profile_loading: false,
            requested_profile: None,

            pending_delete: None,

            task_rx: rx,
            task_tx: tx,
            epoch: 0,

            status_message: None,
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.api.session().is_authenticated()
    }

    pub fn my_user_id(&self) -> Option<i64> {
        self.identity.as_ref().map(|i| i.user_id)
    }

    /// Pick up a stored session from the previous run
    pub async fn restore_session(&mut self) -> bool {
        match self.api.session().restore().await {
            Some(identity) => {
                info!(user_id = identity.user_id, "Resumed stored session");
                self.identity = Some(identity);
                self.identity_rx.borrow_and_update();
                true
            }
            None => false,
        }
    }

    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.login_focus = if self.login_email.is_empty() {
            LoginFocus::Email
        } else {
            LoginFocus::Password
        };
    }

    /// Attempt login with the credentials from the login form
    pub async fn attempt_login(&mut self) -> Result<()> {
        let email = self.login_email.trim().to_string();
        let password = self.login_password.clone();

        if email.is_empty() || password.is_empty() {
            self.login_error = Some("Email and password required".to_string());
            return Err(anyhow::anyhow!("Email and password required"));
        }

        self.login_error = None;

        match self.api.session().login(&email, &password).await {
            Ok(identity) => {
                self.config.last_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }

                self.identity = Some(identity);
                self.identity_rx.borrow_and_update();
                self.login_password.clear();
                self.state = AppState::Normal;
                self.status_message = None;
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.login_error = Some(login_error_message(&e));
                Err(e.into())
            }
        }
    }

    pub fn start_register(&mut self) {
        self.register = RegisterForm {
            email: self.login_email.clone(),
            ..RegisterForm::default()
        };
        self.state = AppState::Registering;
    }

    /// Create an account from the registration form, then log straight in
    pub async fn attempt_register(&mut self) -> Result<()> {
        let registration = Registration {
            email: self.register.email.trim().to_string(),
            name: self.register.name.trim().to_string(),
            password: self.register.password.clone(),
            password_confirm: self.register.confirm.clone(),
        };
        self.register.error = None;

        if let Err(e) = self.api.register(&registration).await {
            warn!(error = %e, "Registration failed");
            self.register.error = Some(describe_error(&e));
            return Err(e);
        }

        self.login_email = registration.email;
        self.login_password = registration.password;
        self.register = RegisterForm::default();
        self.state = AppState::LoggingIn;
        self.attempt_login().await
    }

    /// Log out, drop everything loaded for this user, show the login form
    pub fn logout(&mut self) {
        self.api.session().logout();
        self.identity_rx.borrow_and_update();
        self.clear_user_data();
        self.login_error = None;
        self.status_message = Some("Logged out".to_string());
        self.start_login();
    }

    fn clear_user_data(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.identity = None;
        self.feed.clear();
        self.feed_selection = 0;
        self.feed_filter.clear();
        self.search_users.clear();
        self.search_posts.clear();
        self.last_search = None;
        self.profile = None;
        self.requested_profile = None;
        self.profile_loading = false;
        self.feed_loading = false;
        self.followers.clear();
        self.following.clear();
        self.suggestions.clear();
        self.compose = None;
        self.pending_delete = None;
        self.current_tab = Tab::Feed;
        self.focus = Focus::List;
    }

    /// React to identity changes published by the session. A `None` we did not
    /// ask for means the session was ended by a failed renewal.
    fn check_session(&mut self) {
        if !self.identity_rx.has_changed().unwrap_or(false) {
            return;
        }
        let identity = self.identity_rx.borrow_and_update().clone();
        match identity {
            Some(identity) => self.identity = Some(identity),
            None => {
                if matches!(self.state, AppState::LoggingIn | AppState::Registering) {
                    return;
                }
                warn!("Session ended, returning to login");
                self.clear_user_data();
                self.login_error = Some("Session expired. Please log in again.".to_string());
                self.start_login();
            }
        }
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    /// Run an API call off the UI loop and deliver its result to the channel
    fn spawn_task<F>(&self, task: F)
    where
        F: Future<Output = TaskResult> + Send + 'static,
    {
        let tx = self.task_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let result = task.await;
            if tx.send((epoch, result)).await.is_err() {
                debug!("UI loop gone, dropping task result");
            }
        });
    }

    /// Load the feed and the user's own profile after login
    pub fn load_initial(&mut self) {
        self.feed_loading = true;
        self.profile_loading = true;
        let api = self.api.clone();
        let tx = self.task_tx.clone();
        let epoch = self.epoch;
        let my_id = self.my_user_id();
        self.requested_profile = my_id;

        tokio::spawn(async move {
            let profile = async {
                match my_id {
                    Some(id) => Some(api.fetch_profile_view(id).await),
                    None => None,
                }
            };
            let (feed, profile) = futures::future::join(api.fetch_feed(), profile).await;

            let mut results = vec![match feed {
                Ok(posts) => TaskResult::Feed(posts),
                Err(e) => TaskResult::Error(describe_error(&e)),
            }];
            match profile {
                Some(Ok(view)) => results.push(TaskResult::Profile(view)),
                Some(Err(e)) => results.push(TaskResult::Error(describe_error(&e))),
                None => {}
            }
            for result in results {
                if tx.send((epoch, result)).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        while let Ok((epoch, result)) = self.task_rx.try_recv() {
            if epoch != self.epoch {
                debug!(epoch, current = self.epoch, "Dropping result from an ended session");
                continue;
            }
            self.process_task_result(result);
        }
        self.check_session();
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::Feed(posts) => {
                debug!(count = posts.len(), "Feed loaded");
                self.feed = posts;
                self.feed_loading = false;
                self.clamp_selections();
            }
            TaskResult::PostCreated(post) => {
                if self.viewing_own_profile() {
                    if let Some(view) = self.profile.as_mut() {
                        view.posts.insert(0, post.clone());
                    }
                }
                self.feed.insert(0, post);
                self.feed_selection = 0;
                self.status_message = Some("Posted".to_string());
            }
            TaskResult::PostDeleted(post_id) => {
                self.feed.retain(|p| p.id != post_id);
                self.search_posts.retain(|p| p.id != post_id);
                if let Some(view) = self.profile.as_mut() {
                    view.posts.retain(|p| p.id != post_id);
                }
                self.clamp_selections();
                self.status_message = Some("Post deleted".to_string());
            }
            TaskResult::LikeToggled(post_id, toggle) => {
                self.for_each_post(post_id, |p| p.apply_like(&toggle));
            }
            TaskResult::LikeFailed(post_id, message) => {
                warn!(post_id, "Like failed, reloading");
                self.for_each_post(post_id, Post::toggle_like_optimistic);
                self.status_message = Some(message);
                if self.is_authenticated() {
                    self.refresh_feed();
                }
            }
            TaskResult::CommentAdded(post_id, comment) => {
                self.for_each_post(post_id, |p| p.push_comment(comment.clone()));
                self.status_message = Some("Comment added".to_string());
            }
            TaskResult::SearchResults { query, users, posts } => {
                self.status_message = Some(format!(
                    "{} users, {} posts for \"{}\"",
                    users.len(),
                    posts.len(),
                    query
                ));
                self.last_search = Some(query);
                self.search_users = users;
                self.search_posts = posts;
                self.search_user_selection = 0;
                self.search_post_selection = 0;
            }
            TaskResult::Profile(view) => {
                if self.requested_profile != Some(view.profile.id) {
                    debug!(user_id = view.profile.id, "Ignoring superseded profile");
                    return;
                }
                self.profile = Some(view);
                self.profile_list = ProfileList::Posts;
                self.profile_selection = 0;
                self.profile_loading = false;
            }
            TaskResult::ProfileUpdated(updated) => {
                if let Some(view) = self.profile.as_mut() {
                    if view.profile.id == updated.id {
                        view.profile = updated;
                    }
                }
                self.status_message = Some("Profile updated".to_string());
            }
            TaskResult::FollowToggled(user_id, outcome) => {
                if let Some(view) = self.profile.as_mut() {
                    if view.profile.id == user_id {
                        let following = outcome.is_following();
                        if following && !view.profile.is_following {
                            view.profile.follower_count += 1;
                        } else if !following && view.profile.is_following {
                            view.profile.follower_count =
                                view.profile.follower_count.saturating_sub(1);
                        }
                        view.profile.is_following = following;
                        if let Some(status) = view.follow.as_mut() {
                            status.is_following = following;
                        }
                        self.status_message = Some(if following {
                            format!("Now following {}", view.profile.name)
                        } else {
                            format!("Unfollowed {}", view.profile.name)
                        });
                    }
                }
            }
            TaskResult::Connections {
                user_id,
                followers,
                following,
                show,
            } => {
                if self.profile.as_ref().map(|v| v.profile.id) == Some(user_id) {
                    self.followers = followers;
                    self.following = following;
                    self.profile_list = show;
                    self.profile_selection = 0;
                }
            }
            TaskResult::Suggestions(users) => {
                self.suggestions = users;
                self.profile_list = ProfileList::Suggestions;
                self.profile_selection = 0;
            }
            TaskResult::Error(message) => {
                self.feed_loading = false;
                self.profile_loading = false;
                self.status_message = Some(message);
            }
        }
    }

    /// Apply `f` to every loaded copy of a post
    fn for_each_post(&mut self, post_id: i64, mut f: impl FnMut(&mut Post)) {
        let profile_posts: &mut [Post] = self
            .profile
            .as_mut()
            .map(|v| v.posts.as_mut_slice())
            .unwrap_or_default();
        self.feed
            .iter_mut()
            .chain(self.search_posts.iter_mut())
            .chain(profile_posts.iter_mut())
            .filter(|p| p.id == post_id)
            .for_each(|p| f(p));
    }

    // =========================================================================
    // Actions
    // =========================================================================

    pub fn refresh_feed(&mut self) {
        self.feed_loading = true;
        let api = self.api.clone();
        self.spawn_task(async move {
            match api.fetch_feed().await {
                Ok(posts) => TaskResult::Feed(posts),
                Err(e) => TaskResult::Error(describe_error(&e)),
            }
        });
    }

    pub fn refresh_current_tab(&mut self) {
        match self.current_tab {
            Tab::Feed => self.refresh_feed(),
            Tab::Search => self.run_search(),
            Tab::Profile => {
                if let Some(user_id) = self.profile.as_ref().map(|v| v.profile.id).or(self.my_user_id()) {
                    self.open_profile(user_id);
                }
            }
        }
    }

    pub fn toggle_like_selected(&mut self) {
        let Some(post_id) = self.selected_post().map(|p| p.id) else {
            return;
        };
        self.for_each_post(post_id, Post::toggle_like_optimistic);

        let api = self.api.clone();
        self.spawn_task(async move {
            match api.toggle_like(post_id).await {
                Ok(toggle) => TaskResult::LikeToggled(post_id, toggle),
                Err(e) => TaskResult::LikeFailed(post_id, describe_error(&e)),
            }
        });
    }

    pub fn start_compose(&mut self, kind: ComposeKind) {
        let text = match kind {
            ComposeKind::EditBio => self
                .own_profile()
                .map(|p| p.bio_text().to_string())
                .unwrap_or_default(),
            ComposeKind::EditName => self.own_profile().map(|p| p.name.clone()).unwrap_or_default(),
            _ => String::new(),
        };
        self.compose = Some(Compose {
            kind,
            text,
            error: None,
        });
        self.state = AppState::Composing;
    }

    /// Start a comment on the selected post
    pub fn start_comment(&mut self) {
        if let Some(post_id) = self.selected_post().map(|p| p.id) {
            self.start_compose(ComposeKind::Comment { post_id });
        }
    }

    pub fn cancel_compose(&mut self) {
        self.compose = None;
        self.state = AppState::Normal;
    }

    /// Validate and send the compose overlay's text. Invalid input keeps the
    /// overlay open with an error.
    pub fn submit_compose(&mut self) {
        let Some(compose) = self.compose.as_mut() else {
            self.state = AppState::Normal;
            return;
        };

        let check = match compose.kind {
            ComposeKind::NewPost => validate_post_content(&compose.text).map(|_| ()),
            ComposeKind::Comment { .. } => validate_comment(&compose.text).map(|_| ()),
            ComposeKind::EditBio => validate_bio(&compose.text),
            ComposeKind::EditName => validate_name(&compose.text),
            ComposeKind::PicturePath => {
                if compose.text.trim().is_empty() {
                    Err(ApiError::Validation("Enter a file path".to_string()))
                } else {
                    Ok(())
                }
            }
        };
        if let Err(e) = check {
            compose.error = Some(e.to_string());
            return;
        }

        let kind = compose.kind;
        let text = compose.text.clone();
        self.compose = None;
        self.state = AppState::Normal;

        let api = self.api.clone();
        match kind {
            ComposeKind::NewPost => {
                self.status_message = Some("Posting...".to_string());
                self.spawn_task(async move {
                    match api.create_post(&text).await {
                        Ok(post) => TaskResult::PostCreated(post),
                        Err(e) => TaskResult::Error(describe_error(&e)),
                    }
                });
            }
            ComposeKind::Comment { post_id } => {
                self.spawn_task(async move {
                    match api.add_comment(post_id, &text).await {
                        Ok(comment) => TaskResult::CommentAdded(post_id, comment),
                        Err(e) => TaskResult::Error(describe_error(&e)),
                    }
                });
            }
            ComposeKind::EditBio | ComposeKind::EditName => {
                let update = if kind == ComposeKind::EditBio {
                    ProfileUpdate {
                        bio: Some(text),
                        ..Default::default()
                    }
                } else {
                    ProfileUpdate {
                        name: Some(text.trim().to_string()),
                        ..Default::default()
                    }
                };
                self.spawn_task(async move {
                    match api.update_profile(&update).await {
                        Ok(profile) => TaskResult::ProfileUpdated(profile),
                        Err(e) => TaskResult::Error(describe_error(&e)),
                    }
                });
            }
            ComposeKind::PicturePath => {
                let path = expand_home(text.trim());
                self.status_message = Some("Uploading picture...".to_string());
                self.spawn_task(async move {
                    match api.upload_profile_picture(&path).await {
                        Ok(profile) => TaskResult::ProfileUpdated(profile),
                        Err(e) => TaskResult::Error(describe_error(&e)),
                    }
                });
            }
        }
    }

    /// Ask for confirmation before deleting the selected post. Only the
    /// author's own posts can be deleted.
    pub fn request_delete_selected(&mut self) {
        let Some(post) = self.selected_post() else {
            return;
        };
        let (post_id, own) = (post.id, Some(post.user_id) == self.my_user_id());
        if !own {
            self.status_message = Some("You can only delete your own posts".to_string());
            return;
        }
        self.pending_delete = Some(post_id);
        self.state = AppState::ConfirmingDelete;
    }

    pub fn confirm_delete(&mut self) {
        self.state = AppState::Normal;
        let Some(post_id) = self.pending_delete.take() else {
            return;
        };
        let api = self.api.clone();
        self.spawn_task(async move {
            match api.delete_post(post_id).await {
                Ok(()) => TaskResult::PostDeleted(post_id),
                Err(e) => TaskResult::Error(describe_error(&e)),
            }
        });
    }

    pub fn open_profile(&mut self, user_id: i64) {
        self.current_tab = Tab::Profile;
        self.focus = Focus::List;
        self.profile_loading = true;
        self.requested_profile = Some(user_id);
        let api = self.api.clone();
        self.spawn_task(async move {
            match api.fetch_profile_view(user_id).await {
                Ok(view) => TaskResult::Profile(view),
                Err(e) => TaskResult::Error(describe_error(&e)),
            }
        });
    }

    pub fn open_my_profile(&mut self) {
        if let Some(user_id) = self.my_user_id() {
            self.open_profile(user_id);
        }
    }

    /// Open the profile of the selected post's author, or the selected user
    pub fn open_selected_profile(&mut self) {
        let target = match (self.current_tab, self.focus) {
            (Tab::Search, Focus::List) => self.selected_user().map(|u| u.id),
            (Tab::Profile, _) if self.profile_list != ProfileList::Posts => {
                self.selected_user().map(|u| u.id)
            }
            _ => self.selected_post().map(|p| p.user_id),
        };
        if let Some(user_id) = target {
            self.open_profile(user_id);
        }
    }

    pub fn toggle_follow(&mut self) {
        let Some(view) = self.profile.as_ref() else {
            return;
        };
        if view.follow.is_none() {
            self.status_message = Some("You cannot follow yourself".to_string());
            return;
        }
        let user_id = view.profile.id;
        let api = self.api.clone();
        self.spawn_task(async move {
            match api.toggle_follow(user_id).await {
                Ok(outcome) => TaskResult::FollowToggled(user_id, outcome),
                Err(e) => TaskResult::Error(describe_error(&e)),
            }
        });
    }

    pub fn show_connections(&mut self, show: ProfileList) {
        let Some(user_id) = self.profile.as_ref().map(|v| v.profile.id) else {
            return;
        };
        let api = self.api.clone();
        self.spawn_task(async move {
            match api.fetch_connections(user_id).await {
                Ok((followers, following)) => TaskResult::Connections {
                    user_id,
                    followers,
                    following,
                    show,
                },
                Err(e) => TaskResult::Error(describe_error(&e)),
            }
        });
    }

    pub fn show_suggestions(&mut self) {
        let api = self.api.clone();
        self.spawn_task(async move {
            match api.fetch_suggestions().await {
                Ok(users) => TaskResult::Suggestions(users),
                Err(e) => TaskResult::Error(describe_error(&e)),
            }
        });
    }

    pub fn show_profile_posts(&mut self) {
        self.profile_list = ProfileList::Posts;
        self.profile_selection = 0;
    }

    /// Search users and posts for the current query
    pub fn run_search(&mut self) {
        let query = self.search_query.trim().to_string();
        if query.is_empty() {
            return;
        }
        self.status_message = Some(format!("Searching for \"{}\"...", query));
        let api = self.api.clone();
        self.spawn_task(async move {
            let (users, posts) = tokio::join!(api.search_users(&query), api.search_posts(&query));
            match (users, posts) {
                (Ok(users), Ok(posts)) => TaskResult::SearchResults { query, users, posts },
                (Ok(users), Err(e)) => {
                    warn!(error = %e, "Post search failed");
                    TaskResult::SearchResults {
                        query,
                        users,
                        posts: Vec::new(),
                    }
                }
                (Err(e), _) => TaskResult::Error(describe_error(&e)),
            }
        });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Feed posts passing the local filter
    pub fn visible_feed(&self) -> Vec<&Post> {
        filter_posts(&self.feed, &self.feed_filter)
    }

    pub fn viewing_own_profile(&self) -> bool {
        match (&self.profile, self.my_user_id()) {
            (Some(view), Some(me)) => view.profile.id == me,
            _ => false,
        }
    }

    fn own_profile(&self) -> Option<&UserProfile> {
        if self.viewing_own_profile() {
            self.profile.as_ref().map(|v| &v.profile)
        } else {
            None
        }
    }

    /// Users listed on the profile tab, for the non-post lists
    pub fn profile_users(&self) -> &[UserSummary] {
        match self.profile_list {
            ProfileList::Posts => &[],
            ProfileList::Followers => &self.followers,
            ProfileList::Following => &self.following,
            ProfileList::Suggestions => &self.suggestions,
        }
    }

    /// The post the current tab's selection points at
    pub fn selected_post(&self) -> Option<&Post> {
        match self.current_tab {
            Tab::Feed => self.visible_feed().get(self.feed_selection).copied(),
            Tab::Search => self.search_posts.get(self.search_post_selection),
            Tab::Profile => match self.profile_list {
                ProfileList::Posts => self
                    .profile
                    .as_ref()
                    .and_then(|v| v.posts.get(self.profile_selection)),
                _ => None,
            },
        }
    }

    /// The user the current tab's selection points at
    pub fn selected_user(&self) -> Option<&UserSummary> {
        match self.current_tab {
            Tab::Search => self.search_users.get(self.search_user_selection),
            Tab::Profile => self.profile_users().get(self.profile_selection),
            Tab::Feed => None,
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    fn current_list_len(&self) -> usize {
        match (self.current_tab, self.focus) {
            (Tab::Feed, _) => self.visible_feed().len(),
            (Tab::Search, Focus::List) => self.search_users.len(),
            (Tab::Search, Focus::Detail) => self.search_posts.len(),
            (Tab::Profile, _) => match self.profile_list {
                ProfileList::Posts => self.profile.as_ref().map(|v| v.posts.len()).unwrap_or(0),
                _ => self.profile_users().len(),
            },
        }
    }

    fn selection_mut(&mut self) -> &mut usize {
        match (self.current_tab, self.focus) {
            (Tab::Feed, _) => &mut self.feed_selection,
            (Tab::Search, Focus::List) => &mut self.search_user_selection,
            (Tab::Search, Focus::Detail) => &mut self.search_post_selection,
            (Tab::Profile, _) => &mut self.profile_selection,
        }
    }

    /// Move the current selection by `delta`, staying inside the list
    pub fn move_selection(&mut self, delta: isize) {
        let len = self.current_list_len();
        let selection = self.selection_mut();
        if len == 0 {
            *selection = 0;
            return;
        }
        let target = (*selection as isize + delta).clamp(0, len as isize - 1);
        *selection = target as usize;
    }

    pub fn select_first(&mut self) {
        *self.selection_mut() = 0;
    }

    pub fn select_last(&mut self) {
        let len = self.current_list_len();
        *self.selection_mut() = len.saturating_sub(1);
    }

    fn clamp_selections(&mut self) {
        let feed_len = self.visible_feed().len();
        self.feed_selection = self.feed_selection.min(feed_len.saturating_sub(1));
        self.search_post_selection = self
            .search_post_selection
            .min(self.search_posts.len().saturating_sub(1));
        let profile_len = match self.profile_list {
            ProfileList::Posts => self.profile.as_ref().map(|v| v.posts.len()).unwrap_or(0),
            _ => self.profile_users().len(),
        };
        self.profile_selection = self.profile_selection.min(profile_len.saturating_sub(1));
    }

    /// Reset the feed selection after the filter changed
    pub fn on_filter_changed(&mut self) {
        self.feed_selection = 0;
    }
}

// ============================================================================
// Error messages
// ============================================================================

/// One-line message for the status bar
pub fn describe_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(ApiError::Validation(msg)) | Some(ApiError::BadRequest(msg)) => msg.clone(),
        Some(ApiError::Unauthorized) | Some(ApiError::Session(_)) => {
            "Session expired. Please log in again.".to_string()
        }
        Some(ApiError::AccessDenied(_)) => "You don't have permission to do that".to_string(),
        Some(ApiError::NotFound(_)) => "Not found".to_string(),
        Some(ApiError::RateLimited) => "Too many requests, try again shortly".to_string(),
        Some(ApiError::NetworkError(e)) if e.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        Some(ApiError::NetworkError(_)) => "Unable to connect to server".to_string(),
        Some(other) => other.to_string(),
        None => format!("{:#}", err),
    }
}

/// Message shown under the login form
pub fn login_error_message(err: &SessionError) -> String {
    match err {
        SessionError::InvalidCredentials(_) => "Invalid email or password".to_string(),
        SessionError::Transport(detail) if detail.to_lowercase().contains("timed out") => {
            "Connection timed out. Please try again.".to_string()
        }
        SessionError::Transport(_) => {
            "Unable to connect to server. Check the API URL and your connection.".to_string()
        }
        other => other.to_string(),
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

// ============================================================================
// Input Validation
// ============================================================================

/// Check if a character is valid for text input fields.
/// Filters out control characters that could cause display issues.
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

pub fn can_add_field_char(current_len: usize, max_len: usize, c: char) -> bool {
    current_len < max_len && is_valid_input_char(c)
}

pub fn can_add_compose_char(current_len: usize, c: char) -> bool {
    current_len < MAX_COMPOSE_LENGTH && (is_valid_input_char(c) || c == '\n')
}

pub fn can_add_query_char(current_len: usize, c: char) -> bool {
    current_len < MAX_QUERY_LENGTH && is_valid_input_char(c)
}
