//! Snapshot archives: the state database plus uploaded assets in one zip.
//!
//! Export is a raw bundle of the backing file and the uploads directory.
//! Import stages the archive in a temporary directory, swaps the store
//! contents, then replaces the asset files. The two swaps are separate
//! steps: a crash between them can leave state and assets out of step.

mod extract;

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::config::{STATE_DB_FILE, UPLOADS_DIR};
use crate::error::{CldError, Result};
use crate::store::StateStore;
use crate::workspace::{Workspace, clear_files};

/// Extension accepted for uploaded archives.
pub const ARCHIVE_EXTENSION: &str = "zip";

/// A snapshot archive written by [`SnapshotArchiver::export`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedArchive {
    /// Location of the archive on disk. The caller owns and removes it.
    pub path: PathBuf,
    /// Store watermark when the archive was taken.
    pub watermark: i64,
}

impl ExportedArchive {
    /// Name to offer for download, e.g. `comic-state-1718000000000.zip`.
    pub fn file_name(&self) -> String {
        format!("comic-state-{}.{ARCHIVE_EXTENSION}", self.watermark)
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows copied from the archived database, if it had one.
    pub state_rows: Option<usize>,
    /// Asset files copied, if the archive had an uploads directory.
    pub assets: Option<usize>,
}

/// Exports and imports workspace snapshots.
pub struct SnapshotArchiver {
    store: Arc<StateStore>,
    uploads_dir: PathBuf,
    export_dir: PathBuf,
}

impl SnapshotArchiver {
    /// Archiver for `workspace`, exporting into the system temp directory.
    pub fn new(workspace: &Workspace) -> Self {
        Self {
            store: Arc::clone(workspace.store()),
            uploads_dir: workspace.uploads_dir().to_path_buf(),
            export_dir: std::env::temp_dir(),
        }
    }

    /// Writes exported archives into `dir` instead of the temp directory.
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    /// Bundles the backing database and every uploaded asset into a zip.
    #[instrument(skip(self))]
    pub fn export(&self) -> Result<ExportedArchive> {
        let watermark = self.store.get_all()?.watermark;

        fs::create_dir_all(&self.export_dir)?;
        let staged = tempfile::Builder::new()
            .prefix(&format!("comic-state-{watermark}-"))
            .suffix(&format!(".{ARCHIVE_EXTENSION}"))
            .tempfile_in(&self.export_dir)?;

        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(staged);

        zip.start_file(STATE_DB_FILE, options).map_err(write_err)?;
        zip.write_all(&self.store.read_backing_file()?)?;

        let mut assets: Vec<_> = fs::read_dir(&self.uploads_dir)?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .collect();
        assets.sort_by_key(fs::DirEntry::file_name);

        for asset in &assets {
            let name = asset.file_name();
            let entry_name = format!("{UPLOADS_DIR}/{}", name.to_string_lossy());
            zip.start_file(entry_name, options).map_err(write_err)?;
            io::copy(&mut File::open(asset.path())?, &mut zip)?;
        }

        let staged = zip.finish().map_err(write_err)?;
        let (_, path) = staged.keep().map_err(|e| e.error)?;

        info!(path = %path.display(), watermark, assets = assets.len(), "Snapshot exported");
        Ok(ExportedArchive { path, watermark })
    }

    /// Replaces the workspace with the contents of a snapshot archive.
    ///
    /// The archive is validated by extension and by zip structure before
    /// anything is extracted. A missing database or uploads directory in
    /// the archive leaves that half of the workspace as it was.
    #[instrument(skip(self), fields(archive = %archive.display()))]
    pub fn import(&self, archive: &Path) -> Result<ImportSummary> {
        validate_archive_name(&archive.to_string_lossy())?;

        let reader = BufReader::new(File::open(archive)?);
        let mut zip =
            ZipArchive::new(reader).map_err(|e| CldError::InvalidArchive(e.to_string()))?;

        let staging = tempfile::Builder::new().prefix("cld-import-").tempdir()?;
        let extracted = extract::extract_all(&mut zip, staging.path())?;
        debug!(files = extracted, "Archive extracted");

        let contents = extract::locate(staging.path());
        let mut summary = ImportSummary::default();

        if let Some(db) = &contents.state_db {
            summary.state_rows = Some(self.store.import_from(db)?);
        }

        if let Some(uploads) = &contents.uploads_dir {
            let removed = clear_files(&self.uploads_dir);
            let copied = extract::copy_files(uploads, &self.uploads_dir)?;
            debug!(removed, copied, "Assets replaced");
            summary.assets = Some(copied);
        }

        info!(?summary, "Snapshot imported");
        Ok(summary)
    }
}

/// Rejects archive names without a `.zip` extension.
pub fn validate_archive_name(name: &str) -> Result<()> {
    let is_zip = Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION));

    if is_zip {
        Ok(())
    } else {
        Err(CldError::InvalidArchiveType {
            filename: name.to_string(),
        })
    }
}

fn write_err(e: zip::result::ZipError) -> CldError {
    CldError::Other(format!("Failed to write archive: {e}"))
}
