//! On-disk session credentials owned by the bridge.
//!
//! The bridge reads and writes these directories itself. The gateway only
//! needs to know whether a saved session exists and how to wipe it for
//! re-pairing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::WhatsAppError;

/// Default authentication directory, relative to the working directory.
pub const DEFAULT_AUTH_DIR: &str = ".wwebjs_auth";

/// Default browser cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".wwebjs_cache";

/// Location of the persisted session state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    auth_dir: PathBuf,
    cache_dir: PathBuf,
    preserve_roots: bool,
}

impl SessionStore {
    /// Create a store over the given auth and cache directories.
    pub fn new(auth_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            auth_dir: auth_dir.into(),
            cache_dir: cache_dir.into(),
            preserve_roots: false,
        }
    }

    /// Keep the directories themselves on wipe and only remove their contents.
    ///
    /// Needed when the directories are bind-mounted into the bridge
    /// container: replacing the directory would leave the container holding
    /// the unlinked original.
    #[must_use]
    pub fn with_preserved_roots(mut self, preserve: bool) -> Self {
        self.preserve_roots = preserve;
        self
    }

    /// Authentication directory.
    pub fn auth_dir(&self) -> &Path {
        &self.auth_dir
    }

    /// Cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether the auth directory exists and holds at least one entry.
    pub async fn has_saved_session(&self) -> bool {
        match tokio::fs::read_dir(&self.auth_dir).await {
            Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
            Err(_) => false,
        }
    }

    /// Delete the auth and cache directories recursively. With preserved
    /// roots only their contents are removed.
    ///
    /// Directories that are already absent count as success.
    ///
    /// # Errors
    ///
    /// Returns [`WhatsAppError::SessionStore`] if a directory exists but
    /// cannot be removed.
    pub async fn wipe(&self) -> Result<(), WhatsAppError> {
        // Both directories are attempted even if the first fails.
        let auth = self.clear(&self.auth_dir).await;
        let cache = self.clear(&self.cache_dir).await;
        let (auth_removed, cache_removed) = (auth?, cache?);
        info!(
            auth_dir = %self.auth_dir.display(),
            auth_removed,
            cache_removed,
            "session data wiped"
        );
        Ok(())
    }

    async fn clear(&self, path: &Path) -> std::io::Result<bool> {
        if self.preserve_roots {
            remove_contents_if_present(path).await
        } else {
            remove_dir_if_present(path).await
        }
    }
}

/// Returns `true` when something was removed.
async fn remove_dir_if_present(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "session directory already absent");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Returns `true` when at least one entry was removed.
async fn remove_contents_if_present(path: &Path) -> std::io::Result<bool> {
    let mut entries = match tokio::fs::read_dir(path).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let mut removed = false;
    while let Some(entry) = entries.next_entry().await? {
        let entry_path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&entry_path).await
        } else {
            tokio::fs::remove_file(&entry_path).await
        };
        match result {
            Ok(()) => removed = true,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}
