//! `cleanup` (§4.8): delete the source once every invariant protecting it
//! has been discharged, copy-back to `flacs/`, then move the final
//! artifacts into the destination directory.
//!
//! Implements the `All(xdelta)` barrier (§4.1): this task fully drains the
//! `xdelta` edge to its sentinel before processing the first buffered
//! `pargen` token. Because neither edge depends on `cleanup` making
//! progress to keep producing, a bounded channel simply backpressures
//! `pargen` while the barrier drains -- not a deadlock.

use std::sync::Arc;

use filetime::FileTime;
use log::warn;

use crate::error::EngineError;
use crate::external::cache;
use crate::model::Stage;
use crate::progress::markers;

use super::{forward_all, PipelineContext, Receiver, Sender, Token};

pub async fn run(
    ctx: Arc<PipelineContext>,
    mut pargen_rx: Receiver,
    mut xdelta_rx: Receiver,
    finish_tx: Sender,
) {
    loop {
        match xdelta_rx.recv().await {
            Some(Token::Index(_)) => continue,
            Some(Token::Sentinel) | None => break,
        }
    }

    while let Some(token) = pargen_rx.recv().await {
        let Token::Index(i) = token else {
            forward_all(Token::Sentinel, &[finish_tx]).await;
            break;
        };
        let entry = &ctx.entries[i];
        if !entry.state.lock().unwrap().has_failed() {
            if super::abort_requested(&ctx) {
                entry.state.lock().unwrap().mark_failed(Stage::Cleanup, EngineError::Aborted);
            } else {
                entry.state.lock().unwrap().mark_running(Stage::Cleanup);
                match cleanup_one(&ctx, i).await {
                    Ok(()) => entry.state.lock().unwrap().mark_complete(Stage::Cleanup),
                    Err(e) => entry.state.lock().unwrap().mark_failed(Stage::Cleanup, e),
                }
            }
        }
        forward_all(Token::Index(i), &[finish_tx.clone()]).await;
    }
}

async fn cleanup_one(ctx: &PipelineContext, i: usize) -> Result<(), EngineError> {
    let entry = &ctx.entries[i];
    let progress_dir = entry.info.progress_dir.clone();
    let source_path = entry.info.source_path.clone();
    let basename = entry
        .state
        .lock()
        .unwrap()
        .provided_filename
        .clone()
        .ok_or_else(|| EngineError::PromptValidation("no confirmed filename".into()))?;
    let mtime = entry
        .state
        .lock()
        .unwrap()
        .guessed_timestamp
        .map(|g| g.when)
        .ok_or(EngineError::TimestampParse)?;

    let encoded = markers::encoded_flac(&progress_dir);
    let mut artifacts = vec![(encoded.clone(), format!("{basename}.flac"))];
    for vol in existing_par2_volumes(&progress_dir, &basename).map_err(cleanup_io_fail)? {
        let name = vol.file_name().unwrap().to_string_lossy().into_owned();
        artifacts.push((vol, name));
    }

    if ctx.config.modify_source {
        if source_path.exists() {
            std::fs::remove_file(&source_path).map_err(cleanup_io_fail)?;
        }

        let source_root = source_path.parent().unwrap_or(std::path::Path::new("."));
        let flacs_dir = source_root.join("flacs");
        std::fs::create_dir_all(&flacs_dir).map_err(cleanup_io_fail)?;
        for (src, name) in &artifacts {
            let dest = flacs_dir.join(name);
            if !dest.exists() {
                std::fs::copy(src, &dest).map_err(cleanup_io_fail)?;
                if name.ends_with(".flac") {
                    let ft = FileTime::from_unix_time(mtime.and_utc().timestamp(), 0);
                    filetime::set_file_mtime(&dest, ft).map_err(cleanup_io_fail)?;
                }
            }
            if let Err(e) = cache::advise_evict(&dest) {
                warn!("cache eviction advisory failed for {}: {e}", dest.display());
            }
        }
        ctx.tools
            .verify_par2(&flacs_dir.join(format!("{basename}.flac")))
            .await
            .map_err(|e| EngineError::CopybackVerifyFail(e.to_string()))?;
    }

    std::fs::create_dir_all(&ctx.config.dest_dir).map_err(cleanup_io_fail)?;
    for (src, name) in &artifacts {
        let dest = ctx.config.dest_dir.join(name);
        std::fs::rename(src, &dest)
            .or_else(|_| {
                std::fs::copy(src, &dest).map(|_| ()).and_then(|_| std::fs::remove_file(src))
            })
            .map_err(cleanup_io_fail)?;
        if name.ends_with(".flac") {
            let ft = FileTime::from_unix_time(mtime.and_utc().timestamp(), 0);
            filetime::set_file_mtime(&dest, ft).map_err(cleanup_io_fail)?;
        }
    }

    std::fs::remove_dir_all(&progress_dir).map_err(cleanup_io_fail)?;
    Ok(())
}

/// Maps a filesystem-operation failure during cleanup to its own error kind
/// instead of falling through to `EngineError`'s blanket `ProgressWrite`
/// conversion, which would misreport e.g. "permission denied deleting the
/// source .wav" as a progress-marker write failure in the end-of-run table.
fn cleanup_io_fail(e: std::io::Error) -> EngineError {
    EngineError::CleanupFail(e.to_string())
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
