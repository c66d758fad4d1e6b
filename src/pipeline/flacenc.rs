//! `flacenc` (§4.5): invoke the FLAC encoder, atomically commit its output,
//! then advise the OS to drop the source waveform's cached pages.

use std::sync::Arc;

use log::warn;

use crate::error::EngineError;
use crate::external::cache;
use crate::model::Stage;
use crate::progress::markers;

use super::{forward_all, PipelineContext, Receiver, Sender, Token};

pub async fn run(ctx: Arc<PipelineContext>, mut input: Receiver, pargen_tx: Sender, xdelta_tx: Sender) {
    while let Some(token) = input.recv().await {
        let Token::Index(i) = token else {
            forward_all(Token::Sentinel, &[pargen_tx, xdelta_tx]).await;
            break;
        };
        let entry = &ctx.entries[i];
        if !entry.state.lock().unwrap().has_failed() && super::abort_requested(&ctx) {
            entry.state.lock().unwrap().mark_failed(Stage::FlacEnc, EngineError::Aborted);
        } else if !entry.state.lock().unwrap().has_failed() {
            entry.state.lock().unwrap().mark_running(Stage::FlacEnc);
            match encode_one(&ctx, i).await {
                Ok(()) => entry.state.lock().unwrap().mark_complete(Stage::FlacEnc),
                Err(e) => entry.state.lock().unwrap().mark_failed(Stage::FlacEnc, e),
            }
        }
        forward_all(Token::Index(i), &[pargen_tx.clone(), xdelta_tx.clone()]).await;
    }
}

async fn encode_one(ctx: &PipelineContext, i: usize) -> Result<(), EngineError> {
    let entry = &ctx.entries[i];
    let progress_dir = entry.info.progress_dir.clone();
    let in_progress = markers::in_progress_flac(&progress_dir);
    let encoded = markers::encoded_flac(&progress_dir);

    if in_progress.exists() {
        std::fs::remove_file(&in_progress).map_err(encode_io_fail)?;
    }

    if !encoded.exists() {
        let wav_path = entry.info.source_path.clone();
        match ctx.tools.encode_flac(&wav_path, &in_progress).await {
            Ok(()) => {
                std::fs::rename(&in_progress, &encoded).map_err(encode_io_fail)?;
            }
            Err(e) => {
                let _ = std::fs::remove_file(&in_progress);
                return Err(e);
            }
        }
    }

    if let Err(e) = cache::advise_evict(&entry.info.source_path) {
        warn!("cache eviction advisory failed for {}: {e}", entry.info.source_path.display());
    }

    Ok(())
}

/// Maps a filesystem-operation failure around the `.in_progress.flac` commit
/// to `EncodeFail` instead of falling through to `EngineError`'s blanket
/// `ProgressWrite` conversion.
fn encode_io_fail(e: std::io::Error) -> EngineError {
    EngineError::EncodeFail(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::tests_support::FakeTools;
    use crate::model::{FileEntry, FileInfo};
    use crate::prompt_ui::StdinPrompt;
    use std::sync::atomic::AtomicBool;

    fn ctx_with(tools: FakeTools, entries: Vec<Arc<FileEntry>>) -> Arc<PipelineContext> {
        Arc::new(PipelineContext {
            entries: Arc::new(entries),
            tools: Arc::new(tools),
            prompts: Arc::new(StdinPrompt::new()),
            config: crate::config::RunConfig::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    #[tokio::test]
    async fn encodes_and_renames_atomically() {
        let tmp = tempfile::tempdir().unwrap();
        let wav = tmp.path().join("a.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        let progress_dir = tmp.path().join("progress");
        std::fs::create_dir_all(&progress_dir).unwrap();
        let entry = Arc::new(FileEntry::new(FileInfo {
            index: 0,
            source_path: wav,
            source_size: 4,
            source_mtime: std::time::SystemTime::UNIX_EPOCH,
            progress_dir: progress_dir.clone(),
        }));
        let ctx = ctx_with(FakeTools::default(), vec![entry]);
        encode_one(&ctx, 0).await.unwrap();
        assert!(progress_dir.join(".encoded.flac").exists());
        assert!(!progress_dir.join(".in_progress.flac").exists());
    }

    #[tokio::test]
    async fn skips_encode_when_already_done() {
        let tmp = tempfile::tempdir().unwrap();
        let wav = tmp.path().join("a.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        let progress_dir = tmp.path().join("progress");
        std::fs::create_dir_all(&progress_dir).unwrap();
        std::fs::write(progress_dir.join(".encoded.flac"), b"already-done").unwrap();
        let entry = Arc::new(FileEntry::new(FileInfo {
            index: 0,
            source_path: wav,
            source_size: 4,
            source_mtime: std::time::SystemTime::UNIX_EPOCH,
            progress_dir: progress_dir.clone(),
        }));
        let mut tools = FakeTools::default();
        tools.fail_encode = true; // would fail if invoked; must not be invoked
        let ctx = ctx_with(tools, vec![entry]);
        encode_one(&ctx, 0).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(progress_dir.join(".encoded.flac")).unwrap(),
            "already-done"
        );
    }

    #[tokio::test]
    async fn resumes_after_crash_between_write_and_rename() {
        // Scenario 2: a previous run died after `.in_progress.flac` was
        // written but before the rename to `.encoded.flac`. The stale
        // partial file must be discarded and the file re-encoded from
        // scratch, completing exactly as scenario 1 would.
        let tmp = tempfile::tempdir().unwrap();
        let wav = tmp.path().join("a.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        let progress_dir = tmp.path().join("progress");
        std::fs::create_dir_all(&progress_dir).unwrap();
        std::fs::write(progress_dir.join(".in_progress.flac"), b"stale-partial").unwrap();
        let entry = Arc::new(FileEntry::new(FileInfo {
            index: 0,
            source_path: wav,
            source_size: 4,
            source_mtime: std::time::SystemTime::UNIX_EPOCH,
            progress_dir: progress_dir.clone(),
        }));
        let ctx = ctx_with(FakeTools::default(), vec![entry]);
        encode_one(&ctx, 0).await.unwrap();
        assert!(!progress_dir.join(".in_progress.flac").exists());
        assert!(progress_dir.join(".encoded.flac").exists());
        assert_ne!(
            std::fs::read(progress_dir.join(".encoded.flac")).unwrap(),
            b"stale-partial"
        );
    }

    #[tokio::test]
    async fn discards_partial_output_on_encoder_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let wav = tmp.path().join("a.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        let progress_dir = tmp.path().join("progress");
        std::fs::create_dir_all(&progress_dir).unwrap();
        let entry = Arc::new(FileEntry::new(FileInfo {
            index: 0,
            source_path: wav,
            source_size: 4,
            source_mtime: std::time::SystemTime::UNIX_EPOCH,
            progress_dir: progress_dir.clone(),
        }));
        let mut tools = FakeTools::default();
        tools.fail_encode = true;
        let ctx = ctx_with(tools, vec![entry]);
        let err = encode_one(&ctx, 0).await.unwrap_err();
        assert_eq!(err.kind_name(), "EncodeFail");
        assert!(!progress_dir.join(".in_progress.flac").exists());
        assert!(!progress_dir.join(".encoded.flac").exists());
    }
}
