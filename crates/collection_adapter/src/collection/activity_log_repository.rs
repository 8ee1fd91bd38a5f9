use crate::collection::envelope::{
    EntityCodec, Envelope, FieldFilter, decode_item, is_foreign, optional_string_field, scan_items,
    seal_envelope, string_field,
};
use crate::collection::item::ItemRecord;
use crate::collection::store::{CollectionStore, NewItem};
use crate::domain::{ActivityLog, ActivityLogRepository, DomainResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Codec for activity logs. The log timestamp is the item's creation time.
pub struct ActivityLogCodec;

impl EntityCodec for ActivityLogCodec {
    type Entity = ActivityLog;

    const TYPE_TAG: &'static str = "activity_log";

    fn encode(log: &ActivityLog) -> NewItem {
        let fields = json!({
            "bugId": log.bug_id,
            "bugTitle": log.bug_title,
            "projectId": log.project_id,
            "projectName": log.project_name,
            "action": log.action,
            "performedBy": log.performed_by,
            "performedByName": log.performed_by_name,
            "assignedToName": log.assigned_to_name,
            "newStatus": log.new_status,
        });

        NewItem {
            name: format!("{} {}", log.performed_by_name, log.action),
            description: seal_envelope(Self::TYPE_TAG, fields),
            created_at: log.timestamp,
        }
    }

    fn decode(record: ItemRecord, envelope: &Envelope) -> ActivityLog {
        ActivityLog {
            bug_id: string_field(envelope, "bugId", ""),
            bug_title: string_field(envelope, "bugTitle", ""),
            project_id: string_field(envelope, "projectId", ""),
            project_name: string_field(envelope, "projectName", ""),
            action: string_field(envelope, "action", ""),
            performed_by: string_field(envelope, "performedBy", ""),
            performed_by_name: string_field(envelope, "performedByName", ""),
            assigned_to_name: optional_string_field(envelope, "assignedToName"),
            new_status: optional_string_field(envelope, "newStatus"),
            timestamp: record.created_at,
            id: record.id,
        }
    }
}

fn newest_first(logs: &mut [ActivityLog]) {
    logs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[derive(Clone)]
pub struct CollectionActivityLogRepository {
    store: Arc<dyn CollectionStore>,
    collection: String,
}

impl CollectionActivityLogRepository {
    pub fn new(store: Arc<dyn CollectionStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    async fn scan(&self, filters: &[FieldFilter]) -> DomainResult<Vec<ActivityLog>> {
        let items = self.store.get_all_items(&self.collection).await?;
        let mut logs = scan_items::<ActivityLogCodec>(items, filters);
        newest_first(&mut logs);
        Ok(logs)
    }
}

#[async_trait]
impl ActivityLogRepository for CollectionActivityLogRepository {
    #[instrument(skip(self, log), err, fields(entity_kind = "activity_log", bug_id = %log.bug_id, action = %log.action))]
    async fn create_activity_log(&self, log: ActivityLog) -> DomainResult<ActivityLog> {
        debug!(collection = %self.collection, "creating activity log");

        let stored = self
            .store
            .create_item(&self.collection, ActivityLogCodec::encode(&log))
            .await?;
        let created = decode_item::<ActivityLogCodec>(&stored)?;

        debug!(log_id = ?created.id, "activity log created");
        Ok(created)
    }

    #[instrument(skip(self), err, fields(entity_kind = "activity_log"))]
    async fn get_activity_log(&self, log_id: &str) -> DomainResult<Option<ActivityLog>> {
        debug!(collection = %self.collection, "getting activity log");

        let Some(stored) = self.store.get_item_by_id(&self.collection, log_id).await? else {
            debug!("activity log not found");
            return Ok(None);
        };

        if is_foreign::<ActivityLogCodec>(&stored) {
            warn!("item exists but is not an activity log");
            return Ok(None);
        }

        decode_item::<ActivityLogCodec>(&stored).map(Some)
    }

    #[instrument(skip(self), err, fields(entity_kind = "activity_log"))]
    async fn list_activity_logs_by_bug(&self, bug_id: &str) -> DomainResult<Vec<ActivityLog>> {
        debug!(collection = %self.collection, "listing activity logs for bug");

        let logs = self.scan(&[FieldFilter::eq("bugId", bug_id)]).await?;

        debug!(count = logs.len(), "listed activity logs for bug");
        Ok(logs)
    }

    #[instrument(skip(self), err, fields(entity_kind = "activity_log"))]
    async fn list_activity_logs(&self) -> DomainResult<Vec<ActivityLog>> {
        debug!(collection = %self.collection, "listing all activity logs");

        let logs = self.scan(&[]).await?;

        debug!(count = logs.len(), "listed activity logs");
        Ok(logs)
    }

    #[instrument(skip(self), err, fields(entity_kind = "activity_log"))]
    async fn delete_activity_log(&self, log_id: &str) -> DomainResult<bool> {
        debug!(collection = %self.collection, "deleting activity log");

        let deleted = self.store.delete_item(&self.collection, log_id).await?;
        if deleted {
            debug!("activity log deleted");
        } else {
            warn!("store did not delete activity log");
        }

        Ok(deleted)
    }
}
