//! `pargen` (§4.6): symlink the final name, create/verify the par2 set.
//! Joins the `prompt` and `flacenc` edges: both carry the same index
//! sequence (setup emits a fixed order on every edge), so the two input
//! queues are read in lockstep rather than merged.

use std::sync::Arc;

use log::warn;

use crate::error::EngineError;
use crate::external::cache;
use crate::model::Stage;
use crate::progress::markers;

use super::{forward_all, PipelineContext, Receiver, Sender, Token};

pub async fn run(
    ctx: Arc<PipelineContext>,
    mut prompt_rx: Receiver,
    mut flacenc_rx: Receiver,
    cleanup_tx: Sender,
) {
    loop {
        let a = prompt_rx.recv().await;
        let b = flacenc_rx.recv().await;
        match (a, b) {
            (Some(Token::Sentinel), Some(Token::Sentinel)) => {
                forward_all(Token::Sentinel, &[cleanup_tx]).await;
                break;
            }
            (Some(Token::Index(i)), Some(Token::Index(j))) if i == j => {
                let entry = &ctx.entries[i];
                if !entry.state.lock().unwrap().has_failed() {
                    if super::abort_requested(&ctx) {
                        entry.state.lock().unwrap().mark_failed(Stage::ParGen, EngineError::Aborted);
                    } else {
                        entry.state.lock().unwrap().mark_running(Stage::ParGen);
                        match generate_one(&ctx, i).await {
                            Ok(()) => entry.state.lock().unwrap().mark_complete(Stage::ParGen),
                            Err(e) => entry.state.lock().unwrap().mark_failed(Stage::ParGen, e),
                        }
                    }
                }
                forward_all(Token::Index(i), &[cleanup_tx.clone()]).await;
            }
            // Both edges are FIFO projections of the same setup emission
            // order (I4), so a mismatch here means an upstream stage
            // dropped or reordered a token -- a runtime bug, not a
            // per-file failure we can route around.
            _ => break,
        }
    }
}

async fn generate_one(ctx: &PipelineContext, i: usize) -> Result<(), EngineError> {
    let entry = &ctx.entries[i];
    let progress_dir = entry.info.progress_dir.clone();
    let basename = entry
        .state
        .lock()
        .unwrap()
        .provided_filename
        .clone()
        .ok_or_else(|| EngineError::PromptValidation("no confirmed filename".into()))?;

    let named_flac = markers::named_flac(&progress_dir, &basename);
    let encoded = markers::encoded_flac(&progress_dir);
    if !named_flac.exists() {
        #[cfg(unix)]
        std::os::unix::fs::symlink(&encoded, &named_flac).map_err(par2_io_fail)?;
        #[cfg(not(unix))]
        std::fs::hard_link(&encoded, &named_flac).map_err(par2_io_fail)?;
    }

    let vol_files = existing_par2_volumes(&progress_dir, &basename).map_err(par2_io_fail)?;
    let any_zero_byte = vol_files
        .iter()
        .any(|p| std::fs::metadata(p).map(|m| m.len() == 0).unwrap_or(false));
    let vol_files = if any_zero_byte {
        for f in &vol_files {
            std::fs::remove_file(f).map_err(par2_io_fail)?;
        }
        Vec::new()
    } else {
        vol_files
    };

    if vol_files.is_empty() {
        ctx.tools.create_par2(&named_flac).await?;
    }

    if let Err(e) = cache::advise_evict(&encoded) {
        warn!("cache eviction advisory failed for {}: {e}", encoded.display());
    }
    for f in existing_par2_volumes(&progress_dir, &basename).map_err(par2_io_fail)? {
        if let Err(e) = cache::advise_evict(&f) {
            warn!("cache eviction advisory failed for {}: {e}", f.display());
        }
    }

    let evicted = cache::wait_for_eviction(&encoded, ctx.config.evict_poll_bound())
        .await
        .map_err(par2_io_fail)?;
    if !evicted {
        return Err(EngineError::EvictFail);
    }

    ctx.tools.verify_par2(&named_flac).await?;
    Ok(())
}

/// Maps a filesystem-operation failure during symlinking/par2-volume
/// bookkeeping to `Par2CreateFail` instead of falling through to
/// `EngineError`'s blanket `ProgressWrite` conversion.
fn par2_io_fail(e: std::io::Error) -> EngineError {
    EngineError::Par2CreateFail(e.to_string())
}

fn existing_par2_volumes(dir: &std::path::Path, basename: &str) -> std::io::Result<Vec<std::path::PathBuf>> {
    let prefix = format!("{basename}.flac.vol");
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            out.push(entry.path());
        }
    }
    out.sort();
    Ok(out)
}
