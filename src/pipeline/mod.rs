//! The pipeline runtime: seven stage-actors linked by bounded
//! single-producer/single-consumer queues carrying file indices, plus the
//! `setup` initializer and `finish` terminator. Each stage is a plain
//! `tokio::spawn`ed task — a thread-per-stage model would be the same
//! contract on a runtime without cooperative tasks, per the component
//! design's re-architecture guidance.

pub mod cleanup;
pub mod finish;
pub mod flacenc;
pub mod listen;
pub mod pargen;
pub mod prompt;
pub mod setup;
pub mod xdelta;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::RunConfig;
use crate::external::ExternalTools;
use crate::model::FileEntry;
use crate::prompt_ui::PromptProvider;
use crate::report::RunReport;

/// One token on a stage queue: a file index, or the end-of-stream sentinel.
/// (I4) every index is emitted exactly once per edge, always followed
/// eventually by exactly one `Sentinel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Index(usize),
    Sentinel,
}

pub type Sender = mpsc::Sender<Token>;
pub type Receiver = mpsc::Receiver<Token>;

/// Shared, read-mostly context every stage task closes over.
pub struct PipelineContext {
    pub entries: Arc<Vec<Arc<FileEntry>>>,
    pub tools: Arc<dyn ExternalTools>,
    pub prompts: Arc<dyn PromptProvider>,
    pub config: RunConfig,
    pub cancel: Arc<AtomicBool>,
}

fn channel(capacity: usize) -> (Sender, Receiver) {
    mpsc::channel(capacity.max(1))
}

/// True once an abort has been requested. Stages check this before starting
/// a *new* file's work; a file already in flight always runs to a
/// consistent on-disk state rather than aborting mid-rename or mid-verify.
pub fn abort_requested(ctx: &PipelineContext) -> bool {
    ctx.cancel.load(std::sync::atomic::Ordering::SeqCst)
}

/// Forward `i` downstream, or the sentinel once the input stream ends.
/// Stages call this from their main loop body for the common case of
/// "one input, N outputs, same token shape everywhere."
pub async fn forward_all(token: Token, outs: &[Sender]) {
    for out in outs {
        // A closed receiver means a downstream stage already exited (e.g.
        // after a fatal error); dropping the token is the correct response,
        // not a panic.
        let _ = out.send(token).await;
    }
}

/// Run the full pipeline to completion and produce the end-of-run report.
pub async fn run(
    entries: Vec<Arc<FileEntry>>,
    progress_root: std::path::PathBuf,
    tools: Arc<dyn ExternalTools>,
    prompts: Arc<dyn PromptProvider>,
    config: RunConfig,
    cancel: Arc<AtomicBool>,
) -> RunReport {
    let entries = Arc::new(entries);
    let ctx = Arc::new(PipelineContext {
        entries: entries.clone(),
        tools,
        prompts,
        config,
        cancel,
    });

    let cap = ctx.config.max_parallel_files;
    let (setup_listen_tx, listen_rx) = channel(cap);
    let (setup_flacenc_tx, flacenc_rx) = channel(cap);
    let (listen_prompt_tx, prompt_rx) = channel(cap);
    let (prompt_pargen_tx, prompt_to_pargen_rx) = channel(cap);
    let (flacenc_pargen_tx, flacenc_to_pargen_rx) = channel(cap);
    let (flacenc_xdelta_tx, xdelta_rx) = channel(cap);
    let (xdelta_cleanup_tx, xdelta_to_cleanup_rx) = channel(cap);
    let (pargen_cleanup_tx, pargen_to_cleanup_rx) = channel(cap);
    let (cleanup_finish_tx, finish_rx) = channel(cap);

    // Every downstream stage must already be spawned and polling its
    // receiver before `setup::emit` starts filling these bounded channels --
    // emit sends entries.len() + 1 tokens per edge, so a source directory
    // with at least `cap` files would otherwise block on the (cap+1)th send
    // with no consumer alive to drain it.
    let listen_ctx = ctx.clone();
    let listen_task = tokio::spawn(async move {
        listen::run(listen_ctx, listen_rx, listen_prompt_tx).await;
    });

    let prompt_ctx = ctx.clone();
    let prompt_task = tokio::spawn(async move {
        prompt::run(prompt_ctx, prompt_rx, prompt_pargen_tx).await;
    });

    let flacenc_ctx = ctx.clone();
    let flacenc_task = tokio::spawn(async move {
        flacenc::run(flacenc_ctx, flacenc_rx, flacenc_pargen_tx, flacenc_xdelta_tx).await;
    });

    let xdelta_ctx = ctx.clone();
    let xdelta_task = tokio::spawn(async move {
        xdelta::run(xdelta_ctx, xdelta_rx, xdelta_cleanup_tx).await;
    });

    let pargen_ctx = ctx.clone();
    let pargen_task = tokio::spawn(async move {
        pargen::run(
            pargen_ctx,
            prompt_to_pargen_rx,
            flacenc_to_pargen_rx,
            pargen_cleanup_tx,
        )
        .await;
    });

    let cleanup_ctx = ctx.clone();
    let cleanup_task = tokio::spawn(async move {
        cleanup::run(
            cleanup_ctx,
            pargen_to_cleanup_rx,
            xdelta_to_cleanup_rx,
            cleanup_finish_tx,
        )
        .await;
    });

    let finish_ctx = ctx.clone();
    let finish_task = tokio::spawn(async move { finish::run(finish_ctx, finish_rx, progress_root).await });

    tokio::spawn(async move {
        setup::emit(&entries, setup_listen_tx, setup_flacenc_tx).await;
    });

    let _ = tokio::join!(
        listen_task,
        prompt_task,
        flacenc_task,
        xdelta_task,
        pargen_task,
        cleanup_task,
    );

    finish_task.await.unwrap_or_else(|_| RunReport {
        outcomes: Vec::new(),
        aborted: true,
    })
}
