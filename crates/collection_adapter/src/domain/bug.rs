use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Declares a string-valued bug attribute whose set of values is owned by callers.
macro_rules! opaque_string_value {
    ($(#[$meta:meta])* $name:ident, default = $default:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

opaque_string_value!(
    /// Workflow state of a bug, e.g. `Open`, `In Progress`, `Closed`
    BugStatus,
    default = "Open"
);

opaque_string_value!(
    /// How urgently a bug should be handled
    BugPriority,
    default = "Medium"
);

opaque_string_value!(
    /// Impact of a bug on the product
    BugSeverity,
    default = "Minor"
);

/// Bug entity. `id` stays `None` until the collection store assigns one.
#[derive(Debug, Clone, PartialEq)]
pub struct Bug {
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    pub project_id: String,
    pub reported_by: String,
    pub assigned_to: Option<String>,
    pub status: BugStatus,
    pub priority: BugPriority,
    pub severity: BugSeverity,
    pub tags: Vec<String>,
    pub validated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bug {
    /// New unsaved bug with default status, priority and severity
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        project_id: impl Into<String>,
        reported_by: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            title: title.into(),
            description: description.into(),
            project_id: project_id.into(),
            reported_by: reported_by.into(),
            assigned_to: None,
            status: BugStatus::default(),
            priority: BugPriority::default(),
            severity: BugSeverity::default(),
            tags: Vec::new(),
            validated: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Exact-match filters for listing bugs. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BugFilter {
    pub project_id: Option<String>,
    pub status: Option<BugStatus>,
    pub assigned_to: Option<String>,
}

/// Named field updates keyed by envelope field name (`status`, `assignedTo`, ...)
pub type BugFieldUpdates = Map<String, Value>;

/// Repository trait for bug persistence operations
///
/// Updates are read-modify-write without a concurrency token: two concurrent
/// updates of the same bug can race and the last write wins.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BugRepository: Send + Sync {
    /// Create a new bug; the returned bug carries the store-assigned id
    async fn create_bug(&self, bug: Bug) -> DomainResult<Bug>;

    /// Get a bug by ID
    async fn get_bug(&self, bug_id: &str) -> DomainResult<Option<Bug>>;

    /// List bugs matching every filter that is set
    async fn list_bugs(&self, filter: BugFilter) -> DomainResult<Vec<Bug>>;

    /// Replace the status of a bug
    async fn update_bug_status(
        &self,
        bug_id: &str,
        status: BugStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Bug>;

    /// Assign a bug to a user
    async fn update_bug_assignment(
        &self,
        bug_id: &str,
        assigned_to: String,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Bug>;

    /// Mark a bug as validated or not
    async fn update_bug_validation(
        &self,
        bug_id: &str,
        validated: bool,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Bug>;

    /// Apply several named field updates at once. Unknown names are ignored.
    async fn update_bug_fields(&self, bug_id: &str, updates: BugFieldUpdates) -> DomainResult<Bug>;

    /// Delete a bug, returning whether the store reported success
    async fn delete_bug(&self, bug_id: &str) -> DomainResult<bool>;
}
