//! Crash-safe progress directory management.
//!
//! A `.taketake.<datestamp>` directory next to the source root is the only
//! source of truth for what has already been done; the in-memory `FileInfo`
//! vector built in `setup` is just a cache of it. Every write in this module
//! goes through `write_atomic`, matching the teacher's temp-file-then-rename
//! pattern used for settings persistence in `core/state.rs`.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::EngineError;

const PROGRESS_PREFIX: &str = ".taketake.";
const SRC_MARKER: &str = ".src";

/// Find the newest `.taketake.*` directory directly under `parent`, if any.
pub fn find_existing_progress_root(parent: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(parent)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(PROGRESS_PREFIX) {
            candidates.push(entry.path());
        }
    }
    // Lexicographic order on "<prefix><YYYYMMDD-HHMM>" sorts newest-last,
    // because the datestamp format is zero-padded and big-endian.
    candidates.sort();
    Ok(candidates.pop())
}

/// Create a fresh `.taketake.<now>` directory and write its `.src` marker.
pub fn create_progress_root(parent: &Path, source_root: &Path) -> Result<PathBuf, EngineError> {
    let stamp = Local::now().format("%Y%m%d-%H%M").to_string();
    let root = parent.join(format!("{PROGRESS_PREFIX}{stamp}"));
    std::fs::create_dir_all(&root)
        .map_err(|e| EngineError::SetupFail(format!("create {}: {e}", root.display())))?;
    write_atomic(
        &root.join(SRC_MARKER),
        source_root.to_string_lossy().as_bytes(),
    )
    .map_err(|e| EngineError::SetupFail(format!("write .src: {e}")))?;
    Ok(root)
}

/// Verify an existing progress root's `.src` marker matches `source_root`.
pub fn verify_progress_root(root: &Path, source_root: &Path) -> Result<(), EngineError> {
    let recorded = std::fs::read_to_string(root.join(SRC_MARKER))
        .map_err(|e| EngineError::SetupFail(format!("read .src: {e}")))?;
    let recorded = recorded.trim();
    if recorded != source_root.to_string_lossy() {
        return Err(EngineError::SetupFail(format!(
            "progress root {} refers to source {} but current source is {}",
            root.display(),
            recorded,
            source_root.display()
        )));
    }
    Ok(())
}

/// Remove the top-level progress directory. Only `finish` calls this, and
/// only once every file has succeeded.
pub fn remove_progress_root(root: &Path) -> std::io::Result<()> {
    std::fs::remove_dir_all(root)
}

/// Write `contents` to `path` via a temp file in the same directory followed
/// by a rename, so a reader never observes a partial write.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name().unwrap().to_string_lossy()
    ));
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(contents)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Marker-file path helpers, all relative to a file's own progress sub-directory.
pub mod markers {
    use std::path::{Path, PathBuf};

    pub fn filename_guess(dir: &Path) -> PathBuf {
        dir.join(".filename_guess")
    }

    pub fn filename_provided(dir: &Path) -> PathBuf {
        dir.join(".filename_provided")
    }

    pub fn in_progress_flac(dir: &Path) -> PathBuf {
        dir.join(".in_progress.flac")
    }

    pub fn encoded_flac(dir: &Path) -> PathBuf {
        dir.join(".encoded.flac")
    }

    pub fn named_flac(dir: &Path, basename: &str) -> PathBuf {
        dir.join(format!("{basename}.flac"))
    }

    pub fn xdelta(dir: &Path) -> PathBuf {
        dir.join(".xdelta")
    }
}
