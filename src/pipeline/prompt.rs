//! `prompt` (§4.4): interactive filename curation via the external prompt
//! interface. The stage itself is a single sequential task, so prompts are
//! already serialized — no other stage calls `ctx.prompts`.

use std::sync::Arc;

use chrono::Local;

use crate::error::EngineError;
use crate::filename::parse_and_validate_timestamp;
use crate::model::Stage;
use crate::progress::{markers, write_atomic};

use super::{forward_all, PipelineContext, Receiver, Sender, Token};

pub async fn run(ctx: Arc<PipelineContext>, mut input: Receiver, pargen_tx: Sender) {
    while let Some(token) = input.recv().await {
        let Token::Index(i) = token else {
            forward_all(Token::Sentinel, &[pargen_tx]).await;
            break;
        };
        let entry = &ctx.entries[i];
        let already_failed = entry.state.lock().unwrap().has_failed();
        let already_provided = entry.state.lock().unwrap().provided_filename.is_some();

        if !already_failed && !already_provided && super::abort_requested(&ctx) {
            entry.state.lock().unwrap().mark_failed(Stage::Prompt, EngineError::Aborted);
            forward_all(Token::Index(i), &[pargen_tx.clone()]).await;
            continue;
        }

        if !already_failed && !already_provided {
            entry.state.lock().unwrap().mark_running(Stage::Prompt);
            match curate(&ctx, i).await {
                Ok(()) => entry.state.lock().unwrap().mark_complete(Stage::Prompt),
                Err(e) => entry.state.lock().unwrap().mark_failed(Stage::Prompt, e),
            }
        }

        forward_all(Token::Index(i), &[pargen_tx.clone()]).await;
    }
}

async fn curate(ctx: &PipelineContext, i: usize) -> Result<(), EngineError> {
    let entry = &ctx.entries[i];
    let guessed_timestamp = entry
        .state
        .lock()
        .unwrap()
        .guessed_timestamp
        .ok_or(EngineError::TimestampParse)?;
    let delta_bound = chrono::Duration::hours(ctx.config.prompt_validation_delta_hours);

    loop {
        let default = entry
            .state
            .lock()
            .unwrap()
            .guessed_filename
            .clone()
            .unwrap_or_default();
        let candidate = ctx.prompts.suggest(&default).await;

        let Some(parsed) = parse_and_validate_timestamp(&candidate) else {
            continue;
        };
        let delta = (parsed.when - guessed_timestamp.when).abs();
        if delta > delta_bound {
            continue;
        }
        if parsed.when > Local::now().naive_local() {
            continue;
        }

        write_atomic(&markers::filename_provided(&entry.info.progress_dir), candidate.as_bytes())?;
        entry.state.lock().unwrap().provided_filename = Some(candidate);
        return Ok(());
    }
}
