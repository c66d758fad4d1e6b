//! Real `ExternalTools` backed by child processes, using `tokio::process`
//! the same way the teacher's `convert_file_async` in `conversion/parallel.rs`
//! wraps `ffmpeg`: build a `Command`, await its output, translate a non-zero
//! exit into a typed error.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use super::{BoxFuture, ExternalTools};
use crate::error::EngineError;

/// Paths to the external binaries this engine shells out to. Each defaults
/// to the bare command name, resolved via `PATH`, matching the teacher's
/// `get_ffmpeg_path` fallback-to-`PATH` behavior in `conversion/mod.rs`.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub speech_to_text: PathBuf,
    pub flac: PathBuf,
    pub par2: PathBuf,
    pub xdelta3: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            speech_to_text: PathBuf::from("taketake-listen"),
            flac: PathBuf::from("flac"),
            par2: PathBuf::from("par2"),
            xdelta3: PathBuf::from("xdelta3"),
        }
    }
}

pub struct ProcessTools {
    pub tools: ToolPaths,
}

impl ProcessTools {
    pub fn new(tools: ToolPaths) -> Self {
        Self { tools }
    }
}

fn run_fail(context: &str, output: &std::process::Output) -> String {
    format!(
        "{context}: exit {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    )
}

impl ExternalTools for ProcessTools {
    fn recognize_speech<'a>(
        &'a self,
        wav_path: &'a Path,
        timeout: std::time::Duration,
    ) -> BoxFuture<'a, Result<String, EngineError>> {
        Box::pin(async move {
            let fut = Command::new(&self.tools.speech_to_text)
                .arg(wav_path)
                .stdout(Stdio::piped())
                .output();
            match tokio::time::timeout(timeout, fut).await {
                Err(_) => Err(EngineError::SpeechRecogFail("timed out".to_string())),
                Ok(Err(e)) => Err(EngineError::SpeechRecogFail(e.to_string())),
                Ok(Ok(output)) if !output.status.success() => {
                    Err(EngineError::SpeechRecogFail(run_fail("speech-to-text", &output)))
                }
                Ok(Ok(output)) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            }
        })
    }

    fn encode_flac<'a>(
        &'a self,
        wav_path: &'a Path,
        out_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let output = Command::new(&self.tools.flac)
                .arg("encode")
                .arg(wav_path)
                .arg(out_path)
                .output()
                .await
                .map_err(|e| EngineError::EncodeFail(e.to_string()))?;
            if !output.status.success() {
                let _ = tokio::fs::remove_file(out_path).await;
                return Err(EngineError::EncodeFail(run_fail("flac encode", &output)));
            }
            Ok(())
        })
    }

    fn decode_and_diff<'a>(
        &'a self,
        flac_path: &'a Path,
        base_wav_path: &'a Path,
        out_xdelta_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let mut decoder = Command::new(&self.tools.flac)
                .arg("decode")
                .arg(flac_path)
                .stdout(Stdio::piped())
                .spawn()
                .map_err(|_| EngineError::XdeltaMismatch)?;
            let mut decoder_stdout = decoder.stdout.take().expect("piped stdout");

            let mut differ = Command::new(&self.tools.xdelta3)
                .arg("-s")
                .arg(base_wav_path)
                .arg(out_xdelta_path)
                .stdin(Stdio::piped())
                .spawn()
                .map_err(|_| EngineError::XdeltaMismatch)?;
            let mut differ_stdin = differ.stdin.take().expect("piped stdin");

            let copy = async {
                let mut buf = [0u8; 64 * 1024];
                loop {
                    let n = decoder_stdout
                        .read(&mut buf)
                        .await
                        .map_err(EngineError::from)?;
                    if n == 0 {
                        break;
                    }
                    differ_stdin
                        .write_all(&buf[..n])
                        .await
                        .map_err(EngineError::from)?;
                }
                // Close our end so the differ observes end-of-stream, the
                // same SIGPIPE-equivalent shutdown a shell pipeline gives.
                drop(differ_stdin);
                Ok::<(), EngineError>(())
            };
            copy.await?;

            let decoder_status = decoder.wait().await.map_err(|_| EngineError::XdeltaMismatch)?;
            let differ_status = differ.wait().await.map_err(|_| EngineError::XdeltaMismatch)?;
            if !decoder_status.success() || !differ_status.success() {
                return Err(EngineError::XdeltaMismatch);
            }
            Ok(())
        })
    }

    fn create_par2<'a>(&'a self, target_path: &'a Path) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let output = Command::new(&self.tools.par2)
                .arg("create")
                .arg("-r2") // >= 2% redundancy
                .arg(target_path)
                .output()
                .await
                .map_err(|e| EngineError::Par2CreateFail(e.to_string()))?;
            if !output.status.success() {
                return Err(EngineError::Par2CreateFail(run_fail("par2 create", &output)));
            }
            Ok(())
        })
    }

    fn verify_par2<'a>(&'a self, target_path: &'a Path) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let output = Command::new(&self.tools.par2)
                .arg("verify")
                .arg(target_path)
                .output()
                .await
                .map_err(|e| EngineError::Par2VerifyFail(e.to_string()))?;
            if !output.status.success() {
                return Err(EngineError::Par2VerifyFail(run_fail("par2 verify", &output)));
            }
            Ok(())
        })
    }

    fn wav_duration_secs<'a>(&'a self, wav_path: &'a Path) -> BoxFuture<'a, Result<f64, EngineError>> {
        let wav_path = wav_path.to_path_buf();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let reader = hound::WavReader::open(&wav_path)
                    .map_err(|e| EngineError::EncodeFail(format!("reading {}: {e}", wav_path.display())))?;
                let spec = reader.spec();
                let frames = reader.duration() as f64;
                Ok(frames / spec.sample_rate as f64)
            })
            .await
            .map_err(|e| EngineError::EncodeFail(e.to_string()))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tool_paths_are_bare_names() {
        let tools = ToolPaths::default();
        assert_eq!(tools.flac, PathBuf::from("flac"));
        assert_eq!(tools.xdelta3, PathBuf::from("xdelta3"));
    }
}
