//! Staging area helpers for archive import.

use std::fs::{self, File};
use std::io::{self, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::config::{STATE_DB_FILE, UPLOADS_DIR};
use crate::error::{CldError, Result};

/// Writes every entry of `archive` below `dest`, keeping directory
/// structure. Returns the number of files written.
pub(super) fn extract_all<R: Read + Seek>(archive: &mut ZipArchive<R>, dest: &Path) -> Result<usize> {
    let mut files = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(CldError::Extraction(format!(
                "entry '{}' escapes the archive root",
                entry.name()
            )));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| write_failed(&target, &e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| write_failed(parent, &e))?;
        }
        let mut out = File::create(&target).map_err(|e| write_failed(&target, &e))?;
        io::copy(&mut entry, &mut out).map_err(|e| write_failed(&target, &e))?;
        trace!(path = %target.display(), "Extracted entry");
        files += 1;
    }

    Ok(files)
}

fn write_failed(path: &Path, err: &io::Error) -> CldError {
    CldError::Extraction(format!("cannot write {}: {err}", path.display()))
}

/// What an extracted archive turned out to contain.
#[derive(Debug, Default, PartialEq, Eq)]
pub(super) struct StagedContents {
    pub state_db: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
}

/// Finds the state database and the uploads directory anywhere below
/// `root`, ignoring case. The shallowest match wins.
pub(super) fn locate(root: &Path) -> StagedContents {
    let mut found = StagedContents::default();
    let mut db_depth = usize::MAX;
    let mut uploads_depth = usize::MAX;

    for entry in WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        let name = entry.file_name().to_string_lossy();
        let depth = entry.depth();
        let file_type = entry.file_type();

        if file_type.is_file() && depth < db_depth && name.eq_ignore_ascii_case(STATE_DB_FILE) {
            db_depth = depth;
            found.state_db = Some(entry.path().to_path_buf());
        } else if file_type.is_dir()
            && depth < uploads_depth
            && name.eq_ignore_ascii_case(UPLOADS_DIR)
        {
            uploads_depth = depth;
            found.uploads_dir = Some(entry.path().to_path_buf());
        }
    }

    debug!(?found, "Located archive contents");
    found
}

/// Copies the regular files directly inside `from` into `to`.
pub(super) fn copy_files(from: &Path, to: &Path) -> Result<usize> {
    fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        fs::copy(entry.path(), to.join(entry.file_name()))?;
        copied += 1;
    }
    Ok(copied)
}
