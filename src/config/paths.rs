//! Data directory layout and path helpers.
//!
//! Everything the workspace persists lives under one directory:
//!
//! ```text
//! ~/.comic-layout-designer/
//! ├── state.db       # SQLite key-value state
//! ├── uploads/       # Uploaded image assets
//! ├── overlays/      # Saved template overlays
//! └── config.toml    # Optional settings
//! ```

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{CldError, Result};

/// Name of the default data directory under the user's home.
pub const DATA_DIR_NAME: &str = ".comic-layout-designer";

/// File name of the state database, also its name inside snapshot archives.
pub const STATE_DB_FILE: &str = "state.db";

/// Directory name of uploaded assets, also their sub-path inside archives.
pub const UPLOADS_DIR: &str = "uploads";

const OVERLAYS_DIR: &str = "overlays";
const SETTINGS_FILE: &str = "config.toml";

/// Resolved locations of everything under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Uses `root` as the data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the data directory from an optional override.
    ///
    /// Falls back to `~/.comic-layout-designer` when no override is given.
    pub fn resolve(data_dir: Option<&Path>) -> Result<Self> {
        let root = match data_dir {
            Some(dir) => expand_home(dir)?,
            None => home_dir()?.join(DATA_DIR_NAME),
        };
        debug!(root = %root.display(), "Resolved data directory");
        Ok(Self { root })
    }

    /// Creates the data, uploads, and overlays directories.
    ///
    /// Failure here is a fatal startup error.
    pub fn ensure(&self) -> Result<()> {
        for dir in [self.root.clone(), self.uploads_dir(), self.overlays_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                CldError::Startup(format!("cannot create {}: {e}", dir.display()))
            })?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_db(&self) -> PathBuf {
        self.root.join(STATE_DB_FILE)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join(UPLOADS_DIR)
    }

    pub fn overlays_dir(&self) -> PathBuf {
        self.root.join(OVERLAYS_DIR)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}

/// Expand a leading `~` to the home directory; other paths are returned as-is.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    let path_str = path.to_string_lossy();

    if path_str == "~" || path_str.starts_with("~/") {
        let home = home_dir()?;
        let rest = path_str.strip_prefix("~/").unwrap_or("");
        let resolved = if rest.is_empty() { home } else { home.join(rest) };
        trace!(original = %path.display(), resolved = %resolved.display(), "Expanded home directory path");
        return Ok(resolved);
    }

    Ok(path.to_path_buf())
}

/// Resolve the user's home directory (cross-platform).
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .ok_or_else(|| CldError::Startup("Could not determine home directory".to_string()))
}
