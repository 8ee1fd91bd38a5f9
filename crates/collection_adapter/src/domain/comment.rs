use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Comment left on a bug. Comments are append-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: Option<String>,
    pub bug_id: String,
    pub author_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn new(
        bug_id: impl Into<String>,
        author_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            bug_id: bug_id.into(),
            author_id: author_id.into(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Repository trait for comment persistence operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a new comment
    async fn create_comment(&self, comment: Comment) -> DomainResult<Comment>;

    /// Get a comment by ID
    async fn get_comment(&self, comment_id: &str) -> DomainResult<Option<Comment>>;

    /// List the comments of a bug, oldest first
    async fn list_comments_by_bug(&self, bug_id: &str) -> DomainResult<Vec<Comment>>;

    /// Delete a comment, returning whether the store reported success
    async fn delete_comment(&self, comment_id: &str) -> DomainResult<bool>;
}
