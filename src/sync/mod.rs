pub mod runner;

pub use runner::{FeedConnector, SyncError, SyncOutcome, SyncRunner};
