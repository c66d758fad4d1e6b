//! A configurable fake `ExternalTools`, shared across stage unit tests so
//! each one doesn't hand-roll its own. Defaults to "everything succeeds
//! trivially"; flip a field to exercise a specific failure path.

use std::path::Path;
use std::sync::Mutex;

use super::xdelta_header::encode_zero_delta;
use super::{BoxFuture, ExternalTools};
use crate::error::EngineError;

pub struct FakeTools {
    pub speech_text: String,
    pub fail_speech: bool,
    pub wav_duration: f64,
    pub zero_delta: bool,
    pub fail_encode: bool,
    pub fail_par2_create: bool,
    pub fail_par2_verify: bool,
    pub recognize_calls: Mutex<usize>,
}

impl Default for FakeTools {
    fn default() -> Self {
        Self {
            speech_text: String::new(),
            fail_speech: false,
            wav_duration: 1.0,
            zero_delta: true,
            fail_encode: false,
            fail_par2_create: false,
            fail_par2_verify: false,
            recognize_calls: Mutex::new(0),
        }
    }
}

impl ExternalTools for FakeTools {
    fn recognize_speech<'a>(
        &'a self,
        _wav_path: &'a Path,
        _timeout: std::time::Duration,
    ) -> BoxFuture<'a, Result<String, EngineError>> {
        Box::pin(async move {
            *self.recognize_calls.lock().unwrap() += 1;
            if self.fail_speech {
                Err(EngineError::SpeechRecogFail("fake failure".into()))
            } else {
                Ok(self.speech_text.clone())
            }
        })
    }

    fn encode_flac<'a>(
        &'a self,
        _wav_path: &'a Path,
        out_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            if self.fail_encode {
                return Err(EngineError::EncodeFail("fake failure".into()));
            }
            std::fs::write(out_path, b"FLAC").map_err(EngineError::from)?;
            Ok(())
        })
    }

    fn decode_and_diff<'a>(
        &'a self,
        _flac_path: &'a Path,
        base_wav_path: &'a Path,
        out_xdelta_path: &'a Path,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            let source_size = std::fs::metadata(base_wav_path).map(|m| m.len()).unwrap_or(0);
            let bytes = if self.zero_delta {
                encode_zero_delta(source_size)
            } else {
                encode_zero_delta(source_size + 1)
            };
            std::fs::write(out_xdelta_path, bytes).map_err(EngineError::from)?;
            Ok(())
        })
    }

    fn create_par2<'a>(&'a self, target_path: &'a Path) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            if self.fail_par2_create {
                return Err(EngineError::Par2CreateFail("fake failure".into()));
            }
            let name = target_path.to_string_lossy().into_owned();
            std::fs::write(format!("{name}.vol0000+2.par2"), b"PAR2").map_err(EngineError::from)?;
            Ok(())
        })
    }

    fn verify_par2<'a>(&'a self, _target_path: &'a Path) -> BoxFuture<'a, Result<(), EngineError>> {
        Box::pin(async move {
            if self.fail_par2_verify {
                Err(EngineError::Par2VerifyFail("fake failure".into()))
            } else {
                Ok(())
            }
        })
    }

    fn wav_duration_secs<'a>(&'a self, _wav_path: &'a Path) -> BoxFuture<'a, Result<f64, EngineError>> {
        Box::pin(async move { Ok(self.wav_duration) })
    }
}
