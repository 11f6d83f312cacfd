//! Configuration stores
//!
//! Both stores hand out a content fingerprint as the concurrency token: a
//! write is accepted only while the stored text still hashes to it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, instrument, warn};

use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::{ConcurrencyToken, ConfigStore, FetchedConfig, FileSystem};

const EMPTY_CONFIG: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<cruise xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:noNamespaceSchemaLocation="cruise-config.xsd" schemaVersion="72">
  <server artifactsdir="artifacts" commandRepositoryLocation="default" serverId="96eca4bf-210e-499f-9dc9-0cefdae38d0c" />
</cruise>"#;

/// A server configuration with nothing configured yet.
pub fn empty_config() -> String {
    EMPTY_CONFIG.to_string()
}

fn check_token(current: &str, token: &ConcurrencyToken) -> StoreResult<()> {
    if ConcurrencyToken::fingerprint_of(current) == *token {
        Ok(())
    } else {
        warn!("write: stale token={}", token);
        Err(StoreError::Conflict {
            token: token.to_string(),
        })
    }
}

#[derive(Debug)]
struct MemoryState {
    document: String,
    writes: usize,
    available: bool,
}

/// In-memory store, used as a test double for a real server.
#[derive(Debug)]
pub struct MemoryConfigStore {
    state: Mutex<MemoryState>,
}

impl MemoryConfigStore {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                document: document.into(),
                writes: 0,
                available: true,
            }),
        }
    }

    /// Store holding [`empty_config`].
    pub fn empty() -> Self {
        Self::new(empty_config())
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current stored document.
    pub fn document(&self) -> String {
        self.state().document.clone()
    }

    /// Replace the stored document behind every session's back.
    pub fn replace_document(&self, document: impl Into<String>) {
        self.state().document = document.into();
    }

    /// Number of accepted writes.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    /// Simulate the server going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.state().available = available;
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn fetch(&self) -> StoreResult<FetchedConfig> {
        let state = self.state();
        if !state.available {
            return Err(StoreError::Transport {
                status: Some(503),
                message: "memory store unavailable".to_string(),
            });
        }
        debug!("fetch: bytes={}", state.document.len());
        Ok(FetchedConfig {
            document: state.document.clone(),
            token: ConcurrencyToken::fingerprint_of(&state.document),
        })
    }

    fn write(&self, document: &str, token: &ConcurrencyToken) -> StoreResult<()> {
        let mut state = self.state();
        if !state.available {
            return Err(StoreError::Transport {
                status: Some(503),
                message: "memory store unavailable".to_string(),
            });
        }
        check_token(&state.document, token)?;
        state.document = document.to_string();
        state.writes += 1;
        debug!("write: bytes={} writes={}", document.len(), state.writes);
        Ok(())
    }
}

/// Store backed by a configuration file on disk.
pub struct FileConfigStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoreResult<String> {
        self.fs
            .read_to_string(&self.path)
            .map_err(|e| StoreError::io(format!("read {}", self.path.display()), e))
    }
}

impl ConfigStore for FileConfigStore {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn fetch(&self) -> StoreResult<FetchedConfig> {
        let document = self.read()?;
        let token = ConcurrencyToken::fingerprint_of(&document);
        debug!("fetch: bytes={} token={}", document.len(), token);
        Ok(FetchedConfig { document, token })
    }

    /// Writes to a sibling temp file first, then renames it into place.
    #[instrument(level = "debug", skip(self, document), fields(path = %self.path.display()))]
    fn write(&self, document: &str, token: &ConcurrencyToken) -> StoreResult<()> {
        check_token(&self.read()?, token)?;

        let staging = self.path.with_extension("xml.tmp");
        self.fs
            .ensure_parent(&self.path)
            .map_err(|e| StoreError::io(format!("create parent of {}", self.path.display()), e))?;
        self.fs
            .write(&staging, document)
            .map_err(|e| StoreError::io(format!("write {}", staging.display()), e))?;
        self.fs
            .rename(&staging, &self.path)
            .map_err(|e| StoreError::io(format!("rename onto {}", self.path.display()), e))?;
        debug!("write: bytes={}", document.len());
        Ok(())
    }
}
