pub mod feed;
pub mod memory;
pub mod remote;

pub use feed::{parse_feed_uri, Feed, FeedManager, FeedSubscription};
pub use memory::InMemoryService;
pub use remote::{
    FeedSource, MutableStore, RemoteError, TaskJob, TaskRequest, TaskRunner, TaskStatus, TaskType,
};
