//! Infrastructure layer: I/O implementations and DI container
//!
//! This layer implements I/O boundary traits and wires up the session.

pub mod di;
pub mod error;
pub mod store;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use store::{empty_config, FileConfigStore, MemoryConfigStore};
pub use traits::{ConcurrencyToken, ConfigStore, FetchedConfig, FileSystem, RealFileSystem};
