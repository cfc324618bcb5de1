use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Post {
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }

    /// Case-insensitive match on content or author name. Empty query matches.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty()
            || contains_ignore_case(&self.content, query)
            || contains_ignore_case(&self.user_name, query)
    }

    /// Apply a like toggle result to this post
    pub fn apply_like(&mut self, toggle: &LikeToggle) {
        self.is_liked = toggle.liked;
        self.like_count = toggle.like_count;
    }

    /// Flip the like locally before the server confirms
    pub fn toggle_like_optimistic(&mut self) {
        if self.is_liked {
            self.is_liked = false;
            self.like_count = self.like_count.saturating_sub(1);
        } else {
            self.is_liked = true;
            self.like_count += 1;
        }
    }

    /// Append a freshly created comment
    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
        self.comment_count = self.comment_count.max(self.comments.len() as u64);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    #[serde(default)]
    pub post: Option<i64>,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Response of `posts/{id}/toggle_like/`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeToggle {
    pub liked: bool,
    pub like_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPost<'a> {
    pub content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewComment<'a> {
    pub text: &'a str,
}
