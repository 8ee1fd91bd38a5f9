use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Field the collection store uses for its server-generated item id
pub const AUTO_ID_FIELD: &str = "__auto_id__";

/// Field holding the creation timestamp on a stored item
pub const CREATED_AT_FIELD: &str = "created_at";

/// Transport wrapper some store responses put around the item
pub const PAYLOAD_FIELD: &str = "payload";

/// The three writable fields of a collection item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewItem {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Partial update of an existing item. Name and creation time are fixed once
/// the item exists, so the description is the only field ever rewritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemPatch {
    pub description: String,
}

impl ItemPatch {
    pub fn description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// Client for the generic collection store.
///
/// Items come back in the store's raw JSON representation; callers normalize
/// them with [`crate::collection::ItemRecord::ingest`] before decoding.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Create an item and return it as stored, including its new id
    async fn create_item(&self, collection: &str, item: NewItem) -> anyhow::Result<Value>;

    /// Get a single item, `None` if the id is unknown
    async fn get_item_by_id(&self, collection: &str, id: &str) -> anyhow::Result<Option<Value>>;

    /// Fetch every item of the collection, unfiltered
    async fn get_all_items(&self, collection: &str) -> anyhow::Result<Vec<Value>>;

    /// Apply a partial update and return the item as stored afterwards
    async fn update_item(
        &self,
        collection: &str,
        id: &str,
        patch: ItemPatch,
    ) -> anyhow::Result<Value>;

    /// Delete an item, returning whether the store reported success
    async fn delete_item(&self, collection: &str, id: &str) -> anyhow::Result<bool>;
}
