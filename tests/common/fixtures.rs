//! Test fixture helpers for creating temporary workspaces and archives.
//!
//! Everything lives in a `TempDir` and is cleaned up on drop.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cld::config::DataPaths;
use cld::layout::LayoutCatalog;
use cld::workspace::{Page, Workspace};
use rusqlite::{Connection, params};
use serde_json::json;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// A workspace rooted in a temporary data directory.
///
/// # Example
///
/// ```ignore
/// let ws = TestWorkspace::new();
/// ws.save_uploaded_asset("cat.png", b"meow").unwrap();
/// ```
pub struct TestWorkspace {
    dir: TempDir,
    workspace: Arc<Workspace>,
}

impl TestWorkspace {
    /// Workspace with the bundled layout catalog.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let workspace = open_at(&dir.path().join("data"));
        Self {
            dir,
            workspace: Arc::new(workspace),
        }
    }

    #[must_use]
    pub fn data_paths(&self) -> DataPaths {
        DataPaths::new(self.dir.path().join("data"))
    }

    /// Scratch directory next to the data directory.
    #[must_use]
    pub fn scratch(&self) -> PathBuf {
        let path = self.dir.path().join("scratch");
        std::fs::create_dir_all(&path).expect("Failed to create scratch dir");
        path
    }

    #[must_use]
    pub fn shared(&self) -> Arc<Workspace> {
        Arc::clone(&self.workspace)
    }

    /// Opens a second handle on the same data directory.
    #[must_use]
    pub fn reopen(&self) -> Workspace {
        open_at(self.data_paths().root())
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestWorkspace {
    type Target = Workspace;

    fn deref(&self) -> &Workspace {
        &self.workspace
    }
}

fn open_at(root: &Path) -> Workspace {
    let catalog = LayoutCatalog::bundled().expect("Bundled layouts should load");
    Workspace::open(&DataPaths::new(root), Arc::new(catalog)).expect("Failed to open workspace")
}

/// A pair of pages using bundled layouts, with slot and transform data.
#[must_use]
pub fn sample_pages() -> Vec<Page> {
    serde_json::from_value(json!([
        {
            "id": "page-1",
            "layout": "two-horizontal-angled",
            "gutter": "gutter-md",
            "isLocked": false,
            "slots": {"1": "img-a", "2": "img-b"},
            "transforms": {"1": {"x": 12, "y": -3, "scale": 1.5}}
        },
        {
            "id": "page-2",
            "layout": "two-vertical-angled-top-one-horizontal-bottom",
            "isLocked": true,
            "slots": {"3": "img-c"},
            "notes": "splash page"
        }
    ]))
    .expect("Sample pages should deserialize")
}

/// Writes a zip archive with the given entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("Failed to create zip");
    let mut zip = ZipWriter::new(file);
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        zip.write_all(body).expect("Failed to write zip entry");
    }
    zip.finish().expect("Failed to finish zip");
}

/// Creates a state database the way older installs laid it out.
pub fn write_state_db(path: &Path, rows: &[(&str, &str, i64)]) {
    let conn = Connection::open(path).expect("Failed to create state db");
    conn.execute_batch(
        "CREATE TABLE state (key TEXT PRIMARY KEY, value TEXT NOT NULL, updated_at INTEGER NOT NULL);",
    )
    .expect("Failed to create state table");
    for (key, value, updated_at) in rows {
        conn.execute(
            "INSERT INTO state (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, updated_at],
        )
        .expect("Failed to insert row");
    }
}
