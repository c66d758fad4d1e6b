//! External collaborators: the speech-to-text backend, FLAC codec, par2
//! suite, and xdelta3 differ. Stage code only ever talks to the
//! `ExternalTools` trait, the same dependency-injection shape the teacher
//! uses for `verify_ffmpeg`/`get_ffmpeg_path` in `conversion/mod.rs`, so
//! tests can swap in a fake without spawning real subprocesses.

pub mod cache;
pub mod process;
#[cfg(test)]
pub mod tests_support;
pub mod xdelta_header;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::error::EngineError;

/// A hand-boxed future, the same object-safety trick used in `prompt_ui`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything a stage needs from the world outside this process.
pub trait ExternalTools: Send + Sync {
    /// Run speech-to-text over a prefix of `wav_path`, returning recognized
    /// text. `timeout` bounds one attempt; the caller retries on timeout.
    fn recognize_speech<'a>(
        &'a self,
        wav_path: &'a Path,
        timeout: std::time::Duration,
    ) -> BoxFuture<'a, Result<String, EngineError>>;

    /// Encode `wav_path` to `out_path` (the `.in_progress.flac` scratch path).
    fn encode_flac<'a>(
        &'a self,
        wav_path: &'a Path,
        out_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), EngineError>>;

    /// Decode `flac_path`, piping decoded waveform bytes to `xdelta_diff`'s
    /// stdin consumer through the returned handle's caller-managed pipe.
    /// Decode + diff run as one concurrent operation so backpressure and
    /// SIGPIPE propagate exactly as they would shelling out to a pipeline.
    fn decode_and_diff<'a>(
        &'a self,
        flac_path: &'a Path,
        base_wav_path: &'a Path,
        out_xdelta_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), EngineError>>;

    /// Create a par2 volume set covering `target_path`.
    fn create_par2<'a>(&'a self, target_path: &'a Path) -> BoxFuture<'a, Result<(), EngineError>>;

    /// Verify a par2 set covering `target_path`; exit 0 iff fully recoverable.
    fn verify_par2<'a>(&'a self, target_path: &'a Path) -> BoxFuture<'a, Result<(), EngineError>>;

    /// Duration of the waveform at `wav_path`, in seconds.
    fn wav_duration_secs<'a>(&'a self, wav_path: &'a Path) -> BoxFuture<'a, Result<f64, EngineError>>;
}
