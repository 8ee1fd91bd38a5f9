use crate::collection::envelope::{
    EntityCodec, Envelope, FieldFilter, bool_field, decode_item, is_foreign, optional_string_field,
    scan_items, seal_envelope, string_field, string_list_field,
};
use crate::collection::item::{ItemRecord, TimestampField, format_timestamp, parse_iso8601};
use crate::collection::store::{CollectionStore, ItemPatch, NewItem};
use crate::domain::{
    Bug, BugFieldUpdates, BugFilter, BugPriority, BugRepository, BugSeverity, BugStatus,
    DomainError, DomainResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Codec for bugs: the title is the item name, everything else lives in the envelope
pub struct BugCodec;

impl EntityCodec for BugCodec {
    type Entity = Bug;

    const TYPE_TAG: &'static str = "bug";

    fn encode(bug: &Bug) -> NewItem {
        let fields = json!({
            "description": bug.description,
            "status": bug.status,
            "priority": bug.priority,
            "severity": bug.severity,
            "projectId": bug.project_id,
            "reportedBy": bug.reported_by,
            "assignedTo": bug.assigned_to,
            "tags": bug.tags,
            "validated": bug.validated,
            "updatedAt": format_timestamp(&bug.updated_at),
        });

        NewItem {
            name: bug.title.clone(),
            description: seal_envelope(Self::TYPE_TAG, fields),
            created_at: bug.created_at,
        }
    }

    fn decode(record: ItemRecord, envelope: &Envelope) -> Bug {
        let updated_at =
            TimestampField::read(envelope.get("updatedAt"), record.id.as_deref(), "updatedAt")
                .or_when_absent(record.created_at);

        Bug {
            title: record.name,
            description: string_field(envelope, "description", ""),
            project_id: string_field(envelope, "projectId", ""),
            reported_by: string_field(envelope, "reportedBy", ""),
            assigned_to: optional_string_field(envelope, "assignedTo"),
            status: optional_string_field(envelope, "status")
                .map(BugStatus::from)
                .unwrap_or_default(),
            priority: optional_string_field(envelope, "priority")
                .map(BugPriority::from)
                .unwrap_or_default(),
            severity: optional_string_field(envelope, "severity")
                .map(BugSeverity::from)
                .unwrap_or_default(),
            tags: string_list_field(envelope, "tags"),
            validated: bool_field(envelope, "validated", false),
            created_at: record.created_at,
            updated_at,
            id: record.id,
        }
    }
}

/// Apply one named update to a bug.
///
/// Only the fields listed here can be patched; returns `Ok(false)` for any
/// other name. The title is not patchable since updates only rewrite
/// the description envelope.
fn apply_bug_field(bug: &mut Bug, field: &str, value: Value) -> DomainResult<bool> {
    match field {
        "description" => bug.description = expect_string(field, value)?,
        "status" => bug.status = BugStatus::new(expect_string(field, value)?),
        "priority" => bug.priority = BugPriority::new(expect_string(field, value)?),
        "severity" => bug.severity = BugSeverity::new(expect_string(field, value)?),
        "projectId" => bug.project_id = expect_string(field, value)?,
        "reportedBy" => bug.reported_by = expect_string(field, value)?,
        "assignedTo" => {
            bug.assigned_to = match value {
                Value::Null => None,
                other => Some(expect_string(field, other)?),
            }
        }
        "tags" => bug.tags = expect_string_list(field, value)?,
        "validated" => {
            bug.validated = value
                .as_bool()
                .ok_or_else(|| type_mismatch(field, "a boolean", &value))?
        }
        "updatedAt" => {
            bug.updated_at = value
                .as_str()
                .and_then(parse_iso8601)
                .ok_or_else(|| type_mismatch(field, "an ISO-8601 timestamp", &value))?
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn expect_string(field: &str, value: Value) -> DomainResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(type_mismatch(field, "a string", &other)),
    }
}

fn expect_string_list(field: &str, value: Value) -> DomainResult<Vec<String>> {
    let invalid = || type_mismatch(field, "a list of strings", &value);
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

fn type_mismatch(field: &str, expected: &str, value: &Value) -> DomainError {
    DomainError::InvalidArgument(format!("field '{}' must be {}, got {}", field, expected, value))
}

/// Bug repository backed by the shared collection store
#[derive(Clone)]
pub struct CollectionBugRepository {
    store: Arc<dyn CollectionStore>,
    collection: String,
}

impl CollectionBugRepository {
    pub fn new(store: Arc<dyn CollectionStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    async fn fetch_existing(&self, bug_id: &str) -> DomainResult<Bug> {
        match self.get_bug(bug_id).await? {
            Some(bug) => Ok(bug),
            None => {
                warn!(bug_id = %bug_id, "cannot update missing bug");
                Err(DomainError::BugNotFound(bug_id.to_string()))
            }
        }
    }

    /// Rewrite the whole envelope of an existing bug. Name and creation time
    /// never change after creation, so only the description is sent.
    async fn write_envelope(&self, bug_id: &str, bug: &Bug) -> DomainResult<Bug> {
        let encoded = BugCodec::encode(bug);

        let stored = self
            .store
            .update_item(
                &self.collection,
                bug_id,
                ItemPatch::description(encoded.description),
            )
            .await?;

        let updated = decode_item::<BugCodec>(&stored)?;
        debug!(bug_id = %bug_id, status = %updated.status, "bug envelope rewritten");
        Ok(updated)
    }
}

#[async_trait]
impl BugRepository for CollectionBugRepository {
    #[instrument(skip(self, bug), err, fields(entity_kind = "bug", title = %bug.title, project_id = %bug.project_id))]
    async fn create_bug(&self, bug: Bug) -> DomainResult<Bug> {
        debug!(collection = %self.collection, "creating bug");

        let stored = self
            .store
            .create_item(&self.collection, BugCodec::encode(&bug))
            .await?;
        let created = decode_item::<BugCodec>(&stored)?;

        debug!(bug_id = ?created.id, "bug created");
        Ok(created)
    }

    #[instrument(skip(self), err, fields(entity_kind = "bug"))]
    async fn get_bug(&self, bug_id: &str) -> DomainResult<Option<Bug>> {
        debug!(collection = %self.collection, "getting bug");

        let Some(stored) = self.store.get_item_by_id(&self.collection, bug_id).await? else {
            debug!("bug not found");
            return Ok(None);
        };

        if is_foreign::<BugCodec>(&stored) {
            warn!("item exists but is not a bug");
            return Ok(None);
        }

        decode_item::<BugCodec>(&stored).map(Some)
    }

    #[instrument(skip(self), err, fields(entity_kind = "bug"))]
    async fn list_bugs(&self, filter: BugFilter) -> DomainResult<Vec<Bug>> {
        debug!(collection = %self.collection, "listing bugs");

        let mut filters = Vec::new();
        if let Some(project_id) = filter.project_id {
            filters.push(FieldFilter::eq("projectId", project_id));
        }
        if let Some(status) = filter.status {
            filters.push(FieldFilter::eq("status", status.as_str()));
        }
        if let Some(assigned_to) = filter.assigned_to {
            filters.push(FieldFilter::eq("assignedTo", assigned_to));
        }

        let items = self.store.get_all_items(&self.collection).await?;
        let bugs = scan_items::<BugCodec>(items, &filters);

        debug!(count = bugs.len(), "listed bugs");
        Ok(bugs)
    }

    #[instrument(skip(self), err, fields(entity_kind = "bug"))]
    async fn update_bug_status(
        &self,
        bug_id: &str,
        status: BugStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Bug> {
        debug!("updating bug status");

        let mut bug = self.fetch_existing(bug_id).await?;
        bug.status = status;
        bug.updated_at = updated_at;

        self.write_envelope(bug_id, &bug).await
    }

    #[instrument(skip(self), err, fields(entity_kind = "bug"))]
    async fn update_bug_assignment(
        &self,
        bug_id: &str,
        assigned_to: String,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Bug> {
        debug!("updating bug assignment");

        let mut bug = self.fetch_existing(bug_id).await?;
        bug.assigned_to = Some(assigned_to);
        bug.updated_at = updated_at;

        self.write_envelope(bug_id, &bug).await
    }

    #[instrument(skip(self), err, fields(entity_kind = "bug"))]
    async fn update_bug_validation(
        &self,
        bug_id: &str,
        validated: bool,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<Bug> {
        debug!("updating bug validation");

        let mut bug = self.fetch_existing(bug_id).await?;
        bug.validated = validated;
        bug.updated_at = updated_at;

        self.write_envelope(bug_id, &bug).await
    }

    #[instrument(skip(self, updates), err, fields(entity_kind = "bug", field_count = updates.len()))]
    async fn update_bug_fields(&self, bug_id: &str, updates: BugFieldUpdates) -> DomainResult<Bug> {
        debug!("updating bug fields");

        if updates.is_empty() {
            return Err(DomainError::InvalidArgument("updates cannot be empty".to_string()));
        }

        let mut bug = self.fetch_existing(bug_id).await?;
        let explicit_updated_at = updates.contains_key("updatedAt");

        for (field, value) in updates {
            if !apply_bug_field(&mut bug, &field, value)? {
                warn!(field = %field, "ignoring unknown bug field");
            }
        }

        if !explicit_updated_at {
            bug.updated_at = Utc::now();
        }

        self.write_envelope(bug_id, &bug).await
    }

    #[instrument(skip(self), err, fields(entity_kind = "bug"))]
    async fn delete_bug(&self, bug_id: &str) -> DomainResult<bool> {
        debug!(collection = %self.collection, "deleting bug");

        let deleted = self.store.delete_item(&self.collection, bug_id).await?;
        if deleted {
            debug!("bug deleted");
        } else {
            warn!("store did not delete bug");
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::store::MockCollectionStore;
    use chrono::TimeZone;
    use std::io;
    use std::sync::Mutex;
    use tracing::Level;

    const COLLECTION: &str = "bugtrackr";

    fn sample_bug() -> Bug {
        Bug {
            id: None,
            title: "Login button unresponsive".to_string(),
            description: "Nothing happens on click".to_string(),
            project_id: "proj-1".to_string(),
            reported_by: "user-1".to_string(),
            assigned_to: Some("user-2".to_string()),
            status: BugStatus::new("In Progress"),
            priority: BugPriority::new("High"),
            severity: BugSeverity::new("Major"),
            tags: vec!["ui".to_string(), "auth".to_string()],
            validated: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
        }
    }

    /// What the store sends back for an encoded bug
    fn stored_item(id: &str, item: &NewItem) -> Value {
        json!({
            "__auto_id__": id,
            "name": item.name,
            "description": item.description,
            "created_at": format_timestamp(&item.created_at),
        })
    }

    fn round_trip(bug: &Bug, id: &str) -> Bug {
        decode_item::<BugCodec>(&stored_item(id, &BugCodec::encode(bug))).unwrap()
    }

    #[test]
    fn test_round_trip_with_all_fields() {
        let bug = sample_bug();
        let decoded = round_trip(&bug, "bug-1");

        assert_eq!(
            decoded,
            Bug {
                id: Some("bug-1".to_string()),
                ..bug
            }
        );
    }

    #[test]
    fn test_round_trip_with_optional_fields_absent() {
        let bug = Bug {
            assigned_to: None,
            tags: Vec::new(),
            validated: false,
            ..sample_bug()
        };
        let decoded = round_trip(&bug, "bug-2");

        assert_eq!(decoded.assigned_to, None);
        assert!(decoded.tags.is_empty());
        assert_eq!(
            decoded,
            Bug {
                id: Some("bug-2".to_string()),
                ..bug
            }
        );
    }

    #[test]
    fn test_encode_envelope_layout() {
        let encoded = BugCodec::encode(&sample_bug());
        let envelope: Value = serde_json::from_str(&encoded.description).unwrap();

        assert_eq!(encoded.name, "Login button unresponsive");
        assert_eq!(envelope["type"], "bug");
        assert_eq!(envelope["status"], "In Progress");
        assert_eq!(envelope["projectId"], "proj-1");
        assert_eq!(envelope["assignedTo"], "user-2");
        assert_eq!(envelope["tags"], json!(["ui", "auth"]));
        assert_eq!(envelope["updatedAt"], "2024-01-02T09:00:00Z");
        assert!(envelope.get("title").is_none());
        assert!(envelope.get("createdAt").is_none());
    }

    #[test]
    fn test_decode_legacy_envelope_uses_defaults() {
        let bug = decode_item::<BugCodec>(&json!({
            "__auto_id__": "bug-legacy",
            "name": "Old bug",
            "description": "{\"type\":\"bug\"}",
            "created_at": "2023-05-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(bug.status.as_str(), "Open");
        assert_eq!(bug.priority.as_str(), "Medium");
        assert_eq!(bug.severity.as_str(), "Minor");
        assert_eq!(bug.project_id, "");
        assert!(bug.assigned_to.is_none());
        assert!(!bug.validated);
        assert_eq!(bug.updated_at, bug.created_at);
    }

    #[test]
    fn test_decode_unparseable_updated_at_uses_current_time() {
        let bug = decode_item::<BugCodec>(&json!({
            "__auto_id__": "bug-garbled",
            "name": "Garbled timestamp",
            "description": "{\"type\":\"bug\",\"updatedAt\":\"garbage\"}",
            "created_at": "2020-01-01T00:00:00Z",
        }))
        .unwrap();

        assert_eq!(bug.created_at, Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert_ne!(bug.updated_at, bug.created_at);
        assert!((Utc::now() - bug.updated_at).num_seconds().abs() < 5);
    }

    #[test]
    fn test_apply_bug_field_allow_list() {
        let mut bug = sample_bug();

        assert!(apply_bug_field(&mut bug, "status", json!("Closed")).unwrap());
        assert!(apply_bug_field(&mut bug, "assignedTo", Value::Null).unwrap());
        assert!(!apply_bug_field(&mut bug, "bogus", json!(1)).unwrap());
        assert!(!apply_bug_field(&mut bug, "title", json!("Renamed")).unwrap());

        assert_eq!(bug.status.as_str(), "Closed");
        assert!(bug.assigned_to.is_none());
        assert_eq!(bug.title, "Login button unresponsive");
    }

    #[test]
    fn test_apply_bug_field_rejects_wrong_type() {
        let mut bug = sample_bug();
        let result = apply_bug_field(&mut bug, "validated", json!("yes"));
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));

        let result = apply_bug_field(&mut bug, "tags", json!(["ok", 3]));
        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_update_status_on_missing_bug_does_not_write() {
        let mut store = MockCollectionStore::new();
        store
            .expect_get_item_by_id()
            .withf(|collection, id| collection == COLLECTION && id == "missing")
            .times(1)
            .returning(|_, _| Ok(None));
        store.expect_update_item().times(0);

        let repository = CollectionBugRepository::new(Arc::new(store), COLLECTION);
        let result = repository
            .update_bug_status("missing", BugStatus::new("Closed"), Utc::now())
            .await;

        assert!(matches!(result, Err(DomainError::BugNotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_update_fields_empty_does_not_contact_store() {
        let mut store = MockCollectionStore::new();
        store.expect_get_item_by_id().times(0);
        store.expect_update_item().times(0);

        let repository = CollectionBugRepository::new(Arc::new(store), COLLECTION);
        let result = repository
            .update_bug_fields("bug-1", BugFieldUpdates::new())
            .await;

        assert!(matches!(result, Err(DomainError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_update_status_sends_only_description() {
        let existing = stored_item("bug-1", &BugCodec::encode(&sample_bug()));
        let updated_at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let mut store = MockCollectionStore::new();
        store
            .expect_get_item_by_id()
            .times(1)
            .returning(move |_, _| Ok(Some(existing.clone())));
        store
            .expect_update_item()
            .withf(|_, id, patch: &ItemPatch| {
                id == "bug-1" && patch.description.contains("\"status\":\"Closed\"")
            })
            .times(1)
            .returning(|_, id, patch| {
                Ok(json!({
                    "__auto_id__": id,
                    "name": "Login button unresponsive",
                    "description": patch.description,
                    "created_at": "2024-01-01T09:00:00Z",
                }))
            });

        let repository = CollectionBugRepository::new(Arc::new(store), COLLECTION);
        let bug = repository
            .update_bug_status("bug-1", BugStatus::new("Closed"), updated_at)
            .await
            .unwrap();

        assert_eq!(bug.status.as_str(), "Closed");
        assert_eq!(bug.updated_at, updated_at);
        assert_eq!(bug.tags, vec!["ui".to_string(), "auth".to_string()]);
    }

    #[tokio::test]
    async fn test_get_bug_malformed_description_is_error() {
        let mut store = MockCollectionStore::new();
        store.expect_get_item_by_id().returning(|_, _| {
            Ok(Some(json!({
                "__auto_id__": "bug-9",
                "name": "Broken",
                "description": "{\"type\": \"bug\",",
            })))
        });

        let repository = CollectionBugRepository::new(Arc::new(store), COLLECTION);
        let result = repository.get_bug("bug-9").await;

        assert!(matches!(
            result,
            Err(DomainError::MalformedEnvelope { id, .. }) if id == "bug-9"
        ));
    }

    #[tokio::test]
    async fn test_get_bug_of_other_kind_is_none() {
        let mut store = MockCollectionStore::new();
        store.expect_get_item_by_id().returning(|_, _| {
            Ok(Some(json!({
                "__auto_id__": "c-1",
                "name": "Comment by user-1",
                "description": "{\"type\":\"comment\",\"bugId\":\"bug-1\"}",
            })))
        });

        let repository = CollectionBugRepository::new(Arc::new(store), COLLECTION);
        assert!(repository.get_bug("c-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let mut store = MockCollectionStore::new();
        store
            .expect_get_all_items()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let repository = CollectionBugRepository::new(Arc::new(store), COLLECTION);
        let result = repository.list_bugs(BugFilter::default()).await;

        match result {
            Err(DomainError::RepositoryError(e)) => assert_eq!(e.to_string(), "connection reset"),
            other => panic!("expected RepositoryError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_returns_store_result() {
        let mut store = MockCollectionStore::new();
        store
            .expect_delete_item()
            .withf(|_, id| id == "bug-1")
            .times(1)
            .returning(|_, _| Ok(false));

        let repository = CollectionBugRepository::new(Arc::new(store), COLLECTION);
        assert!(!repository.delete_bug("bug-1").await.unwrap());
    }

    /// Collects formatted log output written while a test runs
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_logged_with_operation_span() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(Level::TRACE)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut store = MockCollectionStore::new();
        store
            .expect_get_all_items()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let repository = CollectionBugRepository::new(Arc::new(store), COLLECTION);
        let result = repository.list_bugs(BugFilter::default()).await;
        assert!(matches!(result, Err(DomainError::RepositoryError(_))));

        let output = logs.contents();
        let failure = output
            .lines()
            .find(|line| line.contains("ERROR"))
            .unwrap_or_else(|| panic!("no error line in:\n{}", output));
        assert!(failure.contains("list_bugs"));
        assert!(failure.contains("entity_kind=\"bug\""));
        assert!(failure.contains("connection reset"));
    }
}
