//! Engine error kinds.
//!
//! One variant per error kind named in the pipeline's error handling design.
//! A per-file error is recorded on that file's `FileState` and carried
//! downstream as a failed token; it never unwinds across a stage boundary.

use std::sync::Arc;

/// Error kinds surfaced by the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("setup failed: {0}")]
    SetupFail(String),

    #[error("speech recognition failed: {0}")]
    SpeechRecogFail(String),

    #[error("could not parse a timestamp from recognized speech")]
    TimestampParse,

    #[error("prompt validation failed: {0}")]
    PromptValidation(String),

    #[error("flac encoder failed: {0}")]
    EncodeFail(String),

    #[error("par2 creation failed: {0}")]
    Par2CreateFail(String),

    #[error("par2 verification failed: {0}")]
    Par2VerifyFail(String),

    #[error("cache eviction did not take effect within the bound")]
    EvictFail,

    #[error("xdelta reported a non-zero delta")]
    XdeltaMismatch,

    #[error("copy-back verification failed: {0}")]
    CopybackVerifyFail(String),

    #[error("cleanup failed: {0}")]
    CleanupFail(String),

    #[error("could not write progress marker: {0}")]
    ProgressWrite(Arc<std::io::Error>),

    #[error("run aborted by operator")]
    Aborted,
}

impl EngineError {
    /// Bare variant name, used for the end-of-run report table.
    pub fn kind_name(&self) -> &'static str {
        match self {
            EngineError::SetupFail(_) => "SetupFail",
            EngineError::SpeechRecogFail(_) => "SpeechRecogFail",
            EngineError::TimestampParse => "TimestampParse",
            EngineError::PromptValidation(_) => "PromptValidation",
            EngineError::EncodeFail(_) => "EncodeFail",
            EngineError::Par2CreateFail(_) => "Par2CreateFail",
            EngineError::Par2VerifyFail(_) => "Par2VerifyFail",
            EngineError::EvictFail => "EvictFail",
            EngineError::XdeltaMismatch => "XdeltaMismatch",
            EngineError::CopybackVerifyFail(_) => "CopybackVerifyFail",
            EngineError::CleanupFail(_) => "CleanupFail",
            EngineError::ProgressWrite(_) => "ProgressWrite",
            EngineError::Aborted => "Aborted",
        }
    }

    /// Fatal (halt-all) errors: SetupFail and explicit Aborted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::SetupFail(_) | EngineError::Aborted)
    }
}

/// Only `progress.rs`'s marker read/write goes through this blanket `?`
/// conversion. Any other stage's filesystem operations (deleting the
/// source, moving artifacts into place, creating a par2 symlink, ...) must
/// map their own `std::io::Error` to a stage-specific variant explicitly --
/// relying on this impl there would mislabel the error as `ProgressWrite` in
/// the end-of-run report.
impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::ProgressWrite(Arc::new(e))
    }
}
