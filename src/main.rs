use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use taketake::cli::Args;
use taketake::config::RunConfig;
use taketake::external::process::{ProcessTools, ToolPaths};
use taketake::prompt_ui::StdinPrompt;
use taketake::{logging, pipeline};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(args.verbose, args.log_file.clone());

    let base_config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    let config = args.apply(base_config);

    let discovery = pipeline::setup::discover(&config.source_dir)?;
    log::info!(
        "discovered {} file(s) under {}",
        discovery.entries.len(),
        config.source_dir.display()
    );

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("abort requested; finishing in-flight work before exiting");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    let tools = Arc::new(ProcessTools::new(ToolPaths::default()));
    let prompts = Arc::new(StdinPrompt::new());

    let report = pipeline::run(
        discovery.entries,
        discovery.progress_root,
        tools,
        prompts,
        config,
        cancel,
    )
    .await;

    print!("{}", report.render());
    std::process::exit(report.exit_code());
}
