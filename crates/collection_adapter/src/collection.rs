mod activity_log_repository;
mod bug_repository;
mod comment_repository;
mod config;
mod envelope;
mod in_memory_store;
mod item;
mod repositories;
mod store;

pub use activity_log_repository::*;
pub use bug_repository::*;
pub use comment_repository::*;
pub use self::config::*;
pub use envelope::*;
pub use in_memory_store::*;
pub use item::*;
pub use repositories::*;
pub use store::*;
