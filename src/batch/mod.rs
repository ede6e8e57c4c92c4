pub mod builder;

pub use builder::{BatchBuilder, BatchError, PendingBatch};
