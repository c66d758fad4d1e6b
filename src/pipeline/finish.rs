//! `finish` (§4.9): drains `cleanup`'s output, then either removes the
//! top-level progress directory (every file succeeded) or leaves it intact
//! to enable resume.

use std::sync::Arc;

use log::info;

use crate::progress::remove_progress_root;
use crate::report::{FileOutcome, RunReport};

use super::{PipelineContext, Receiver, Token};

pub async fn run(ctx: Arc<PipelineContext>, mut input: Receiver, progress_root: std::path::PathBuf) -> RunReport {
    while let Some(token) = input.recv().await {
        if token == Token::Sentinel {
            break;
        }
    }

    let outcomes: Vec<FileOutcome> = ctx
        .entries
        .iter()
        .map(|entry| {
            let state = entry.state.lock().unwrap();
            FileOutcome {
                source_path: entry.info.source_path.clone(),
                basename: state.provided_filename.clone().or_else(|| state.guessed_filename.clone()),
                failed: state.first_error.clone(),
            }
        })
        .collect();

    let report = RunReport {
        aborted: ctx.cancel.load(std::sync::atomic::Ordering::SeqCst),
        outcomes,
    };

    if report.any_failed() {
        info!("run incomplete, preserving progress directory {}", progress_root.display());
    } else {
        match remove_progress_root(&progress_root) {
            Ok(()) => info!("run complete, removed {}", progress_root.display()),
            Err(e) => log::warn!("failed to remove {}: {e}", progress_root.display()),
        }
    }

    report
}
