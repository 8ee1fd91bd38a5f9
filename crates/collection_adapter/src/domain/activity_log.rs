use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Record of something that happened to a bug. Display names are
/// denormalized at write time so listings never need extra lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLog {
    pub id: Option<String>,
    pub bug_id: String,
    pub bug_title: String,
    pub project_id: String,
    pub project_name: String,
    pub action: String,
    pub performed_by: String,
    pub performed_by_name: String,
    pub assigned_to_name: Option<String>,
    pub new_status: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Repository trait for activity log persistence operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ActivityLogRepository: Send + Sync {
    /// Append a new activity log entry
    async fn create_activity_log(&self, log: ActivityLog) -> DomainResult<ActivityLog>;

    /// Get an activity log entry by ID
    async fn get_activity_log(&self, log_id: &str) -> DomainResult<Option<ActivityLog>>;

    /// List the activity of a bug, newest first
    async fn list_activity_logs_by_bug(&self, bug_id: &str) -> DomainResult<Vec<ActivityLog>>;

    /// List all activity, newest first
    async fn list_activity_logs(&self) -> DomainResult<Vec<ActivityLog>>;

    /// Delete an activity log entry, returning whether the store reported success
    async fn delete_activity_log(&self, log_id: &str) -> DomainResult<bool>;
}
