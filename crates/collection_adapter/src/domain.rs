mod activity_log;
mod bug;
mod comment;
mod result;

pub use activity_log::*;
pub use bug::*;
pub use comment::*;
pub use result::*;
