//! Global initializer (§4.2): discovers source `.wav` files, builds the
//! shared `FileInfo[]`, creates or resumes the top-level progress directory,
//! and seeds the `listen`/`flacenc` input queues.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::EngineError;
use crate::model::{FileEntry, FileInfo};
use crate::progress;

use super::{Sender, Token};

/// Result of running setup: the file table plus the progress root it lives
/// under (needed later by `finish` to remove the directory on full success).
pub struct Discovery {
    pub entries: Vec<Arc<FileEntry>>,
    pub progress_root: PathBuf,
}

/// Scan `source_dir` (or resume an existing `.taketake.*` next to it) and
/// build the file table. `source_dir`'s parent hosts the progress directory.
pub fn discover(source_dir: &Path) -> Result<Discovery, EngineError> {
    let parent = source_dir
        .parent()
        .ok_or_else(|| EngineError::SetupFail(format!("{} has no parent directory", source_dir.display())))?;

    let progress_root = match progress::find_existing_progress_root(parent)
        .map_err(|e| EngineError::SetupFail(e.to_string()))?
    {
        Some(existing) => {
            progress::verify_progress_root(&existing, source_dir)?;
            existing
        }
        None => progress::create_progress_root(parent, source_dir)?,
    };

    let mut wav_paths: Vec<PathBuf> = std::fs::read_dir(source_dir)
        .map_err(|e| EngineError::SetupFail(format!("reading {}: {e}", source_dir.display())))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("wav"))
        .collect();
    wav_paths.sort();

    let mut entries = Vec::with_capacity(wav_paths.len());
    for (index, source_path) in wav_paths.into_iter().enumerate() {
        let metadata = std::fs::metadata(&source_path)
            .map_err(|e| EngineError::SetupFail(format!("stat {}: {e}", source_path.display())))?;
        let basename = source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let progress_dir = progress_root.join(&basename);
        std::fs::create_dir_all(&progress_dir)
            .map_err(|e| EngineError::SetupFail(format!("create {}: {e}", progress_dir.display())))?;

        let entry = Arc::new(FileEntry::new(FileInfo {
            index,
            source_path,
            source_size: metadata.len(),
            source_mtime: metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            progress_dir: progress_dir.clone(),
        }));

        {
            let mut state = entry.state.lock().unwrap();
            if let Ok(text) = std::fs::read_to_string(progress::markers::filename_guess(&progress_dir)) {
                if !text.trim().is_empty() {
                    state.guessed_filename = Some(text.trim().to_string());
                }
            }
            if let Ok(text) = std::fs::read_to_string(progress::markers::filename_provided(&progress_dir)) {
                if !text.trim().is_empty() {
                    state.provided_filename = Some(text.trim().to_string());
                }
            }
        }

        entries.push(entry);
    }

    Ok(Discovery { entries, progress_root })
}

/// Emit every index, then the sentinel, on both of setup's output edges.
pub async fn emit(entries: &[Arc<FileEntry>], listen_tx: Sender, flacenc_tx: Sender) {
    for i in 0..entries.len() {
        let _ = listen_tx.send(Token::Index(i)).await;
        let _ = flacenc_tx.send(Token::Index(i)).await;
    }
    let _ = listen_tx.send(Token::Sentinel).await;
    let _ = flacenc_tx.send(Token::Sentinel).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_sorts_and_creates_progress_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let source_dir = tmp.path().join("medium");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::write(source_dir.join("b.wav"), b"").unwrap();
        std::fs::write(source_dir.join("a.wav"), b"").unwrap();
        std::fs::write(source_dir.join("notes.txt"), b"").unwrap();

        let discovery = discover(&source_dir).unwrap();
        assert_eq!(discovery.entries.len(), 2);
        assert!(discovery.entries[0].info.source_path.ends_with("a.wav"));
        assert!(discovery.entries[1].info.source_path.ends_with("b.wav"));
        assert!(discovery.entries[0].info.progress_dir.exists());
    }

    #[test]
    fn discover_resumes_existing_progress_root() {
        let tmp = tempfile::tempdir().unwrap();
        let source_dir = tmp.path().join("medium");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::write(source_dir.join("a.wav"), b"").unwrap();

        let first = discover(&source_dir).unwrap();
        let second = discover(&source_dir).unwrap();
        assert_eq!(first.progress_root, second.progress_root);
    }

    #[test]
    fn discover_loads_markers_written_by_a_prior_interrupted_run() {
        // Scenario 3: a previous run wrote both filename markers, then the
        // process was killed before `pargen` ran. Re-discovering the same
        // source must load both markers back into the file's state so
        // `listen`/`prompt` see the file as already handled and skip it.
        let tmp = tempfile::tempdir().unwrap();
        let source_dir = tmp.path().join("medium");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::write(source_dir.join("a.wav"), b"").unwrap();

        let first = discover(&source_dir).unwrap();
        let progress_dir = first.entries[0].info.progress_dir.clone();
        progress::write_atomic(
            &progress::markers::filename_guess(&progress_dir),
            b"rec.20211106-104400-Sat.1m.notes.a",
        )
        .unwrap();
        progress::write_atomic(
            &progress::markers::filename_provided(&progress_dir),
            b"piano.20211106-104400-Sat.1m.notes.a",
        )
        .unwrap();

        let second = discover(&source_dir).unwrap();
        let state = second.entries[0].state.lock().unwrap();
        assert_eq!(
            state.guessed_filename.as_deref(),
            Some("rec.20211106-104400-Sat.1m.notes.a")
        );
        assert_eq!(
            state.provided_filename.as_deref(),
            Some("piano.20211106-104400-Sat.1m.notes.a")
        );
    }

    #[tokio::test]
    async fn emit_sends_every_index_then_sentinel() {
        let (listen_tx, mut listen_rx) = tokio::sync::mpsc::channel(8);
        let (flacenc_tx, mut flacenc_rx) = tokio::sync::mpsc::channel(8);
        let tmp = tempfile::tempdir().unwrap();
        let entries = vec![Arc::new(FileEntry::new(FileInfo {
            index: 0,
            source_path: tmp.path().join("a.wav"),
            source_size: 0,
            source_mtime: std::time::SystemTime::UNIX_EPOCH,
            progress_dir: tmp.path().join("a.wav.progress"),
        }))];
        emit(&entries, listen_tx, flacenc_tx).await;
        assert_eq!(listen_rx.recv().await, Some(Token::Index(0)));
        assert_eq!(listen_rx.recv().await, Some(Token::Sentinel));
        assert_eq!(flacenc_rx.recv().await, Some(Token::Index(0)));
        assert_eq!(flacenc_rx.recv().await, Some(Token::Sentinel));
    }
}
