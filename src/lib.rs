//! Incremental synchronization of a newest-first, cursor-paginated log feed into
//! an ordered, token-protected log stream.
//!
//! A run reads the stored watermark, walks the feed until it reaches entries it
//! has already delivered, appends the new entries oldest-first, and only then
//! moves the watermark forward.

pub mod batch;
pub mod cli;
pub mod config;
pub mod sink;
pub mod source;
pub mod state;
pub mod storage;
pub mod sync;
