pub mod duckdb;
pub mod memory;
pub mod traits;

pub use traits::{ParameterKind, ParameterStore, StorageError};
