pub mod credentials;
pub mod watermark;

pub use credentials::{resolve_api_key, CredentialError};
pub use watermark::{StateError, SyncState, WatermarkStore};
