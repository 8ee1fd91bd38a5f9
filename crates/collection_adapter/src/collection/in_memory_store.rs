use crate::collection::store::{AUTO_ID_FIELD, CollectionStore, ItemPatch, NewItem, PAYLOAD_FIELD};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type Collection = Vec<(String, Value)>;

/// In-memory collection store that answers with the same item shape as the
/// hosted store: `__auto_id__`, `name`, `description` and a string
/// `created_at`. Listing preserves insertion order.
#[derive(Clone, Default)]
pub struct InMemoryCollectionStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    wrap_in_payload: bool,
}

impl InMemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap single-item responses in a `payload` object, as some store
    /// deployments do
    pub fn with_payload_wrapping(mut self) -> Self {
        self.wrap_in_payload = true;
        self
    }

    /// Insert an item verbatim, bypassing the create path. Used to seed
    /// legacy or corrupt records.
    pub async fn insert_raw(&self, collection: &str, id: &str, mut item: Value) {
        if let Value::Object(fields) = &mut item {
            fields.insert(AUTO_ID_FIELD.to_string(), Value::String(id.to_string()));
        }
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push((id.to_string(), item));
    }

    fn respond(&self, item: Value) -> Value {
        if self.wrap_in_payload {
            json!({ PAYLOAD_FIELD: item })
        } else {
            item
        }
    }
}

#[async_trait]
impl CollectionStore for InMemoryCollectionStore {
    async fn create_item(&self, collection: &str, item: NewItem) -> anyhow::Result<Value> {
        let id = xid::new().to_string();

        let mut stored = serde_json::to_value(&item).context("failed to serialize item")?;
        if let Value::Object(fields) = &mut stored {
            fields.insert(AUTO_ID_FIELD.to_string(), Value::String(id.clone()));
        }

        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push((id, stored.clone()));

        Ok(self.respond(stored))
    }

    async fn get_item_by_id(&self, collection: &str, id: &str) -> anyhow::Result<Option<Value>> {
        let collections = self.collections.read().await;
        let item = collections
            .get(collection)
            .and_then(|items| items.iter().find(|(item_id, _)| item_id == id))
            .map(|(_, item)| self.respond(item.clone()));
        Ok(item)
    }

    async fn get_all_items(&self, collection: &str) -> anyhow::Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|items| items.iter().map(|(_, item)| item.clone()).collect())
            .unwrap_or_default())
    }

    async fn update_item(
        &self,
        collection: &str,
        id: &str,
        patch: ItemPatch,
    ) -> anyhow::Result<Value> {
        let changes = serde_json::to_value(&patch).context("failed to serialize patch")?;

        let mut collections = self.collections.write().await;
        let (_, item) = collections
            .get_mut(collection)
            .and_then(|items| items.iter_mut().find(|(item_id, _)| item_id == id))
            .ok_or_else(|| anyhow!("item {} not found in collection {}", id, collection))?;

        if let (Value::Object(fields), Value::Object(changes)) = (&mut *item, changes) {
            fields.extend(changes);
        }

        Ok(self.respond(item.clone()))
    }

    async fn delete_item(&self, collection: &str, id: &str) -> anyhow::Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(items) = collections.get_mut(collection) else {
            return Ok(false);
        };

        let before = items.len();
        items.retain(|(item_id, _)| item_id != id);
        Ok(items.len() < before)
    }
}
