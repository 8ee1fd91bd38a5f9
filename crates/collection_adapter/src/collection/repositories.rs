use crate::collection::{
    CollectionActivityLogRepository, CollectionBugRepository, CollectionCommentRepository,
    CollectionConfig, CollectionStore,
};
use crate::domain::{ActivityLogRepository, BugRepository, CommentRepository, DomainResult};
use crate::garde::validate_struct;
use std::sync::Arc;
use tracing::info;

/// The three entity repositories, sharing one store and one collection
#[derive(Clone)]
pub struct CollectionRepositories {
    pub bugs: Arc<dyn BugRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub activity_logs: Arc<dyn ActivityLogRepository>,
}

impl CollectionRepositories {
    pub fn new(store: Arc<dyn CollectionStore>, config: &CollectionConfig) -> DomainResult<Self> {
        validate_struct(config)?;

        let collection = config.collection_name.as_str();
        info!(collection = %collection, "initializing collection repositories");

        Ok(Self {
            bugs: Arc::new(CollectionBugRepository::new(store.clone(), collection)),
            comments: Arc::new(CollectionCommentRepository::new(store.clone(), collection)),
            activity_logs: Arc::new(CollectionActivityLogRepository::new(store, collection)),
        })
    }
}
