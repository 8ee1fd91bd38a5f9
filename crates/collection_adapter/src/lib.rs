pub mod collection;
pub mod domain;
pub mod garde;
pub mod telemetry;

pub use collection::*;
pub use domain::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use collection::MockCollectionStore;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockActivityLogRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockBugRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockCommentRepository;
