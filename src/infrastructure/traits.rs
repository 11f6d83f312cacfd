//! I/O boundary traits for testability
//!
//! These traits abstract the configuration store and the local filesystem,
//! allowing the session to be tested with in-memory implementations.

use std::fmt;
use std::io;
use std::path::Path;

use crate::application::hash::content_fingerprint;
use crate::infrastructure::error::StoreResult;

/// Opaque value identifying the stored revision a session was loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConcurrencyToken(String);

impl ConcurrencyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token derived from the document text itself.
    pub fn fingerprint_of(document: &str) -> Self {
        Self(content_fingerprint(document.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Document text plus the token to present when writing it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedConfig {
    pub document: String,
    pub token: ConcurrencyToken,
}

/// Where the configuration document lives.
///
/// Transport retries, if any, happen inside the implementation.
pub trait ConfigStore: Send + Sync {
    /// Fetch the current document and its token.
    fn fetch(&self) -> StoreResult<FetchedConfig>;

    /// Replace the document, provided `token` still identifies the stored revision.
    fn write(&self, document: &str, token: &ConcurrencyToken) -> StoreResult<()>;
}

/// Filesystem abstraction for testability.
pub trait FileSystem: Send + Sync {
    /// Read file contents to string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write string content to file.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Create directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Rename/move a file.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create parent directories if needed.
    fn ensure_parent(&self, path: &Path) -> io::Result<()>;
}

// ============================================================
// Real implementations
// ============================================================

/// Real filesystem implementation.
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, content: &str) -> io::Result<()> {
        std::fs::write(path, content)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}
