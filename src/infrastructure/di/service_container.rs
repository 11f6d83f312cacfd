//! Service container for dependency injection
//!
//! Wires settings, filesystem and store into configuration sessions.

use std::sync::Arc;

use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, ConfigSession};
use crate::config::Settings;
use crate::infrastructure::store::FileConfigStore;
use crate::infrastructure::traits::{ConfigStore, FileSystem, RealFileSystem};

/// Container holding the dependencies every session needs.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Where the configuration document lives
    pub store: Arc<dyn ConfigStore>,
}

impl ServiceContainer {
    /// Create a container backed by the file named in `settings.config_file`.
    pub fn new(settings: Settings) -> ApplicationResult<Self> {
        let path = settings
            .config_file
            .clone()
            .ok_or_else(|| ApplicationError::Config {
                message: "config_file is not set".to_string(),
            })?;
        debug!("new: config_file={}", path.display());
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let store = Arc::new(FileConfigStore::new(path, fs.clone()));
        Ok(Self::with_deps(settings, fs, store))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self { settings, fs, store }
    }

    /// Fetch the current document and open a session on it.
    pub fn open_session(&self) -> ApplicationResult<ConfigSession> {
        ConfigSession::load(self.store.clone(), self.fs.clone(), self.settings.clone())
    }
}
