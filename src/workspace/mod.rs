//! Typed workspace facade over the state store.
//!
//! Exposes images, pages, and page count with read/modify/write semantics,
//! manages uploaded asset files, and owns the layout catalog.

mod model;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::config::DataPaths;
use crate::error::{CldError, Result};
use crate::layout::LayoutCatalog;
use crate::store::{StateDump, StateKey, StateStore};

pub use model::{ImageItem, Page, UPLOADS_URL_PREFIX, WorkspaceSnapshot};

/// The workspace: persisted state, asset directories, and layouts.
pub struct Workspace {
    store: Arc<StateStore>,
    uploads_dir: PathBuf,
    overlays_dir: PathBuf,
    catalog: Arc<LayoutCatalog>,
}

impl Workspace {
    /// Opens the workspace stored under `paths`, creating it if needed.
    pub fn open(paths: &DataPaths, catalog: Arc<LayoutCatalog>) -> Result<Self> {
        paths.ensure()?;
        let store = StateStore::open(paths.state_db())
            .map_err(|e| CldError::Startup(format!("cannot open state store: {e}")))?;
        Self::new(Arc::new(store), paths, catalog)
    }

    /// Wraps an existing store; asset directories come from `paths`.
    pub fn new(
        store: Arc<StateStore>,
        paths: &DataPaths,
        catalog: Arc<LayoutCatalog>,
    ) -> Result<Self> {
        let uploads_dir = paths.uploads_dir();
        let overlays_dir = paths.overlays_dir();
        std::fs::create_dir_all(&uploads_dir)?;
        std::fs::create_dir_all(&overlays_dir)?;

        Ok(Self {
            store,
            uploads_dir,
            overlays_dir,
            catalog,
        })
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn overlays_dir(&self) -> &Path {
        &self.overlays_dir
    }

    pub fn catalog(&self) -> &LayoutCatalog {
        &self.catalog
    }

    // === State ===

    pub fn images(&self) -> Result<Vec<ImageItem>> {
        Ok(self.store.get_as(StateKey::Images)?.unwrap_or_default())
    }

    pub fn set_images(&self, images: &[ImageItem]) -> Result<()> {
        self.store.set(StateKey::Images, &images)?;
        Ok(())
    }

    pub fn pages(&self) -> Result<Vec<Page>> {
        Ok(self.store.get_as(StateKey::Pages)?.unwrap_or_default())
    }

    pub fn page_count(&self) -> Result<usize> {
        Ok(self.store.get_as(StateKey::PageCount)?.unwrap_or_default())
    }

    /// Replaces the page list; the page count is written in the same batch.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn set_pages(&self, pages: &[Page]) -> Result<()> {
        self.store.set_many(&[
            (StateKey::Pages, serde_json::to_value(pages)?),
            (StateKey::PageCount, json!(pages.len())),
        ])?;
        debug!("Pages saved");
        Ok(())
    }

    /// Reads images, pages, and page count in one consistent read.
    pub fn snapshot(&self) -> Result<WorkspaceSnapshot> {
        let dump = self.store.get_all()?;
        Ok(WorkspaceSnapshot {
            images: decode(&dump, StateKey::Images)?,
            pages: decode(&dump, StateKey::Pages)?,
            page_count: decode(&dump, StateKey::PageCount)?,
            watermark: dump.watermark,
        })
    }

    pub fn last_modified(&self) -> Result<i64> {
        self.store.last_modified()
    }

    /// Clears every asset file and resets the persisted state to empty.
    ///
    /// Asset deletion failures are ignored.
    #[instrument(skip(self))]
    pub fn reset(&self) -> Result<()> {
        let removed = clear_files(&self.uploads_dir);
        self.store.set_many(&[
            (StateKey::Images, StateKey::Images.default_value()),
            (StateKey::Pages, StateKey::Pages.default_value()),
            (StateKey::PageCount, StateKey::PageCount.default_value()),
        ])?;
        info!(removed, "Workspace reset");
        Ok(())
    }

    // === Assets ===

    /// Writes an uploaded asset under its original name and appends it to
    /// the image list.
    ///
    /// An existing asset with the same name is overwritten.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn save_uploaded_asset(&self, filename: &str, bytes: &[u8]) -> Result<ImageItem> {
        validate_asset_name(filename)?;

        std::fs::write(self.uploads_dir.join(filename), bytes)?;

        let item = ImageItem::new(filename);
        let added = item.clone();
        self.store
            .update(StateKey::Images, move |images: &mut Vec<ImageItem>| {
                images.push(added);
            })?;

        info!(id = %item.id, filename, "Asset uploaded");
        Ok(item)
    }

    /// Removes an image from the list and unlinks its asset file.
    ///
    /// Returns false if no image had that id. A missing asset file is not
    /// an error.
    #[instrument(skip(self))]
    pub fn delete_image(&self, id: &str) -> Result<bool> {
        let removed = self
            .store
            .update(StateKey::Images, |images: &mut Vec<ImageItem>| {
                let position = images.iter().position(|img| img.id == id)?;
                Some(images.remove(position))
            })?;

        let Some(image) = removed else {
            debug!("No image with that id");
            return Ok(false);
        };

        match std::fs::remove_file(self.uploads_dir.join(&image.filename)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(filename = %image.filename, error = %e, "Failed to remove asset file"),
        }

        info!(filename = %image.filename, "Image deleted");
        Ok(true)
    }

    /// Saves a template overlay PNG under a sanitized name.
    ///
    /// Returns the stored file name.
    pub fn save_overlay(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let safe = overlay_slug(name).ok_or_else(|| CldError::InvalidFilename {
            name: name.to_string(),
            reason: "overlay name has no usable characters".to_string(),
        })?;
        let file_name = format!("{safe}.png");
        std::fs::write(self.overlays_dir.join(&file_name), bytes)?;
        debug!(file = %file_name, "Overlay saved");
        Ok(file_name)
    }

    // === Layouts ===

    pub fn render_layout<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        self.catalog.render(name, data)
    }
}

fn decode<T: DeserializeOwned + Default>(dump: &StateDump, key: StateKey) -> Result<T> {
    dump.get(key).map_or_else(
        || Ok(T::default()),
        |value| {
            serde_json::from_value(value.clone()).map_err(|e| {
                CldError::Serialization(format!("Malformed value for '{key}': {e}"))
            })
        },
    )
}

/// Rejects names that would escape the uploads directory.
fn validate_asset_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name is a directory reference")
    } else if name.contains(['/', '\\', '\0']) {
        Some("name contains a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(CldError::InvalidFilename {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Lowercases, collapses runs of characters outside `[a-z0-9-]` into `-`,
/// and trims dashes.
fn overlay_slug(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '-' {
            slug.push(c);
            in_run = false;
        } else if !in_run {
            slug.push('-');
            in_run = true;
        }
    }
    let slug = slug.trim_matches('-');
    (!slug.is_empty()).then(|| slug.to_string())
}

/// Best-effort removal of every regular file directly inside `dir`.
pub(crate) fn clear_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .filter(|entry| match std::fs::remove_file(entry.path()) {
            Ok(()) => true,
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "Ignoring asset removal failure");
                false
            }
        })
        .count()
}
