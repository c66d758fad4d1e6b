//! `xdelta` (§4.7): cross-verify the encoded FLAC against the source
//! waveform by piping a decode into `xdelta3` and inspecting the resulting
//! VCDIFF for the zero-delta witness shape.

use std::sync::Arc;

use crate::error::EngineError;
use crate::external::cache;
use crate::external::xdelta_header::is_zero_delta_witness_file;
use crate::model::Stage;
use crate::progress::markers;

use super::{forward_all, PipelineContext, Receiver, Sender, Token};

pub async fn run(ctx: Arc<PipelineContext>, mut input: Receiver, cleanup_tx: Sender) {
    while let Some(token) = input.recv().await {
        let Token::Index(i) = token else {
            forward_all(Token::Sentinel, &[cleanup_tx]).await;
            break;
        };
        let entry = &ctx.entries[i];
        if !entry.state.lock().unwrap().has_failed() {
            if super::abort_requested(&ctx) {
                entry.state.lock().unwrap().mark_failed(Stage::XDelta, EngineError::Aborted);
            } else {
                entry.state.lock().unwrap().mark_running(Stage::XDelta);
                match verify_one(&ctx, i).await {
                    Ok(()) => entry.state.lock().unwrap().mark_complete(Stage::XDelta),
                    Err(e) => entry.state.lock().unwrap().mark_failed(Stage::XDelta, e),
                }
            }
        }
        forward_all(Token::Index(i), &[cleanup_tx.clone()]).await;
    }
}

async fn verify_one(ctx: &PipelineContext, i: usize) -> Result<(), EngineError> {
    let entry = &ctx.entries[i];
    let source_path = entry.info.source_path.clone();
    let source_size = entry.info.source_size;
    let progress_dir = entry.info.progress_dir.clone();
    let xdelta_path = markers::xdelta(&progress_dir);
    let encoded = markers::encoded_flac(&progress_dir);

    if !source_path.exists() {
        return Ok(());
    }
    if xdelta_path.exists() && is_zero_delta_witness_file(&xdelta_path, source_size).unwrap_or(false) {
        return Ok(());
    }

    let evicted = cache::wait_for_eviction(&source_path, ctx.config.evict_poll_bound()).await?;
    if !evicted {
        return Err(EngineError::EvictFail);
    }

    ctx.tools.decode_and_diff(&encoded, &source_path, &xdelta_path).await?;

    if !is_zero_delta_witness_file(&xdelta_path, source_size)? {
        return Err(EngineError::XdeltaMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::tests_support::FakeTools;
    use crate::model::{FileEntry, FileInfo};
    use crate::prompt_ui::StdinPrompt;
    use std::sync::atomic::AtomicBool;

    fn ctx_with(tools: FakeTools, entries: Vec<Arc<FileEntry>>) -> Arc<PipelineContext> {
        let mut config = crate::config::RunConfig::default();
        config.evict_poll_bound_secs = 1;
        Arc::new(PipelineContext {
            entries: Arc::new(entries),
            tools: Arc::new(tools),
            prompts: Arc::new(StdinPrompt::new()),
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    #[tokio::test]
    async fn succeeds_on_zero_delta() {
        let tmp = tempfile::tempdir().unwrap();
        let wav = tmp.path().join("a.wav");
        std::fs::write(&wav, b"0123456789").unwrap();
        let progress_dir = tmp.path().join("progress");
        std::fs::create_dir_all(&progress_dir).unwrap();
        std::fs::write(progress_dir.join(".encoded.flac"), b"FLAC").unwrap();
        let entry = Arc::new(FileEntry::new(FileInfo {
            index: 0,
            source_path: wav,
            source_size: 10,
            source_mtime: std::time::SystemTime::UNIX_EPOCH,
            progress_dir,
        }));
        let ctx = ctx_with(FakeTools::default(), vec![entry]);
        verify_one(&ctx, 0).await.unwrap();
    }

    #[tokio::test]
    async fn fails_on_nonzero_delta() {
        let tmp = tempfile::tempdir().unwrap();
        let wav = tmp.path().join("a.wav");
        std::fs::write(&wav, b"0123456789").unwrap();
        let progress_dir = tmp.path().join("progress");
        std::fs::create_dir_all(&progress_dir).unwrap();
        std::fs::write(progress_dir.join(".encoded.flac"), b"FLAC").unwrap();
        let entry = Arc::new(FileEntry::new(FileInfo {
            index: 0,
            source_path: wav,
            source_size: 10,
            source_mtime: std::time::SystemTime::UNIX_EPOCH,
            progress_dir,
        }));
        let mut tools = FakeTools::default();
        tools.zero_delta = false;
        let ctx = ctx_with(tools, vec![entry]);
        let err = verify_one(&ctx, 0).await.unwrap_err();
        assert_eq!(err.kind_name(), "XdeltaMismatch");
    }

    #[tokio::test]
    async fn skips_when_source_already_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let wav = tmp.path().join("a.wav"); // never created
        let progress_dir = tmp.path().join("progress");
        std::fs::create_dir_all(&progress_dir).unwrap();
        let entry = Arc::new(FileEntry::new(FileInfo {
            index: 0,
            source_path: wav,
            source_size: 10,
            source_mtime: std::time::SystemTime::UNIX_EPOCH,
            progress_dir,
        }));
        let ctx = ctx_with(FakeTools::default(), vec![entry]);
        verify_one(&ctx, 0).await.unwrap();
    }
}
