//! `listen` (§4.3): speech-to-text + timestamp parse + filename guess.

use std::sync::Arc;

use log::warn;

use crate::filename::{build_guessed_basename, parse_talkytime};
use crate::model::Stage;
use crate::progress::{markers, write_atomic};

use super::{forward_all, PipelineContext, Receiver, Sender, Token};

pub async fn run(ctx: Arc<PipelineContext>, mut input: Receiver, prompt_tx: Sender) {
    while let Some(token) = input.recv().await {
        let Token::Index(i) = token else {
            forward_all(Token::Sentinel, &[prompt_tx]).await;
            break;
        };
        let entry = &ctx.entries[i];
        {
            let state = entry.state.lock().unwrap();
            if state.has_failed() {
                drop(state);
                forward_all(Token::Index(i), &[prompt_tx.clone()]).await;
                continue;
            }
            if state.guessed_filename.is_some() {
                drop(state);
                forward_all(Token::Index(i), &[prompt_tx.clone()]).await;
                continue;
            }
        }

        if super::abort_requested(&ctx) {
            entry.state.lock().unwrap().mark_failed(Stage::Listen, crate::error::EngineError::Aborted);
            forward_all(Token::Index(i), &[prompt_tx.clone()]).await;
            continue;
        }

        entry.state.lock().unwrap().mark_running(Stage::Listen);

        match recognize_and_guess(&ctx, i).await {
            Ok(()) => entry.state.lock().unwrap().mark_complete(Stage::Listen),
            Err(e) => entry.state.lock().unwrap().mark_failed(Stage::Listen, e),
        }

        forward_all(Token::Index(i), &[prompt_tx.clone()]).await;
    }
}

async fn recognize_and_guess(ctx: &PipelineContext, i: usize) -> Result<(), crate::error::EngineError> {
    use crate::error::EngineError;

    let entry = &ctx.entries[i];
    let wav_path = entry.info.source_path.clone();
    let timeout = ctx.config.speech_timeout();

    let mut attempts_left = ctx.config.speech_retries + 1;
    let text = loop {
        match ctx.tools.recognize_speech(&wav_path, timeout).await {
            Ok(text) => break text,
            Err(e) if attempts_left > 1 => {
                warn!("speech recognition retrying for {}: {e}", wav_path.display());
                attempts_left -= 1;
            }
            Err(e) => return Err(e),
        }
    };

    let guess = parse_talkytime(&text).ok_or(EngineError::TimestampParse)?;
    let duration = ctx.tools.wav_duration_secs(&wav_path).await?;

    let orig_basename = wav_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let basename = build_guessed_basename(&ctx.config.prefix, &guess, duration, "", &orig_basename);

    write_atomic(&markers::filename_guess(&entry.info.progress_dir), basename.as_bytes())?;

    let mut state = entry.state.lock().unwrap();
    state.guessed_timestamp = Some(guess);
    state.guessed_filename = Some(basename);
    state.duration = Some(duration);
    Ok(())
}
