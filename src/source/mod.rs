pub mod feed;
pub mod page;
pub mod timestamp;

pub use feed::{FeedError, HttpFeed, LogFeed};
pub use page::{LogEntry, Page};
pub use timestamp::{TimestampError, TimestampParser};
