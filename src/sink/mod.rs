pub mod traits;
pub mod writer;

pub use traits::{LogEvent, LogSink, SinkError};
pub use writer::SinkWriter;
