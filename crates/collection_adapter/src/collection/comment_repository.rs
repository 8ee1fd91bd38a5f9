use crate::collection::envelope::{
    EntityCodec, Envelope, FieldFilter, decode_item, is_foreign, scan_items, seal_envelope,
    string_field,
};
use crate::collection::item::ItemRecord;
use crate::collection::store::{CollectionStore, NewItem};
use crate::domain::{Comment, CommentRepository, DomainResult};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct CommentCodec;

impl EntityCodec for CommentCodec {
    type Entity = Comment;

    const TYPE_TAG: &'static str = "comment";

    fn encode(comment: &Comment) -> NewItem {
        let fields = json!({
            "bugId": comment.bug_id,
            "authorId": comment.author_id,
            "message": comment.message,
        });

        NewItem {
            name: format!("Comment by {}", comment.author_id),
            description: seal_envelope(Self::TYPE_TAG, fields),
            created_at: comment.created_at,
        }
    }

    fn decode(record: ItemRecord, envelope: &Envelope) -> Comment {
        Comment {
            bug_id: string_field(envelope, "bugId", ""),
            author_id: string_field(envelope, "authorId", ""),
            message: string_field(envelope, "message", ""),
            created_at: record.created_at,
            id: record.id,
        }
    }
}

#[derive(Clone)]
pub struct CollectionCommentRepository {
    store: Arc<dyn CollectionStore>,
    collection: String,
}

impl CollectionCommentRepository {
    pub fn new(store: Arc<dyn CollectionStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl CommentRepository for CollectionCommentRepository {
    #[instrument(skip(self, comment), err, fields(entity_kind = "comment", bug_id = %comment.bug_id))]
    async fn create_comment(&self, comment: Comment) -> DomainResult<Comment> {
        debug!(collection = %self.collection, "creating comment");

        let stored = self
            .store
            .create_item(&self.collection, CommentCodec::encode(&comment))
            .await?;
        let created = decode_item::<CommentCodec>(&stored)?;

        debug!(comment_id = ?created.id, "comment created");
        Ok(created)
    }

    #[instrument(skip(self), err, fields(entity_kind = "comment"))]
    async fn get_comment(&self, comment_id: &str) -> DomainResult<Option<Comment>> {
        debug!(collection = %self.collection, "getting comment");

        let Some(stored) = self
            .store
            .get_item_by_id(&self.collection, comment_id)
            .await?
        else {
            debug!("comment not found");
            return Ok(None);
        };

        if is_foreign::<CommentCodec>(&stored) {
            warn!("item exists but is not a comment");
            return Ok(None);
        }

        decode_item::<CommentCodec>(&stored).map(Some)
    }

    #[instrument(skip(self), err, fields(entity_kind = "comment"))]
    async fn list_comments_by_bug(&self, bug_id: &str) -> DomainResult<Vec<Comment>> {
        debug!(collection = %self.collection, "listing comments for bug");

        let items = self.store.get_all_items(&self.collection).await?;
        let mut comments = scan_items::<CommentCodec>(items, &[FieldFilter::eq("bugId", bug_id)]);
        comments.sort_by_key(|comment| comment.created_at);

        debug!(count = comments.len(), "listed comments");
        Ok(comments)
    }

    #[instrument(skip(self), err, fields(entity_kind = "comment"))]
    async fn delete_comment(&self, comment_id: &str) -> DomainResult<bool> {
        debug!(collection = %self.collection, "deleting comment");

        let deleted = self.store.delete_item(&self.collection, comment_id).await?;
        if deleted {
            debug!("comment deleted");
        } else {
            warn!("store did not delete comment");
        }

        Ok(deleted)
    }
}
