//! Run configuration: defaults, TOML file, and CLI overrides layered in
//! that order, mirroring the teacher's `DisplaySettings` JSON-file-plus-
//! override pattern in `core/state.rs` but with `toml` instead of `serde_json`
//! since this is a CLI tool rather than an app-support JSON blob.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for one run of the pipeline. Every field has a default matching
/// the component design's stated defaults; a TOML file and CLI flags each
/// override the previous layer field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Source directory to watch/scan for new recordings.
    pub source_dir: PathBuf,
    /// Destination directory that completed, renamed `.flac` files land in.
    pub dest_dir: PathBuf,
    /// Seconds allowed for one speech-recognition attempt before retrying.
    pub speech_timeout_secs: u64,
    /// Retries after an initial speech-recognition timeout.
    pub speech_retries: u32,
    /// Seconds to poll for cache eviction to take effect before failing.
    pub evict_poll_bound_secs: u64,
    /// Acceptable distance, in hours, between a guessed and operator-provided
    /// timestamp before prompt validation rejects the override.
    pub prompt_validation_delta_hours: i64,
    /// Number of `.flac`/`.par2`/xdelta worker stages allowed to run at once.
    pub max_parallel_files: usize,
    /// Path to the `.taketake.<datestamp>` progress root; defaults next to
    /// `source_dir` when unset.
    pub progress_root: Option<PathBuf>,
    /// Whether `cleanup` is allowed to delete the source `.wav` and populate
    /// `<source_root>/flacs/`. Disabled for a dry run (scenario 6).
    pub modify_source: bool,
    /// Prefix used when assembling a speech-derived guessed basename.
    pub prefix: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            dest_dir: PathBuf::from("."),
            speech_timeout_secs: 120,
            speech_retries: 1,
            evict_poll_bound_secs: 30,
            prompt_validation_delta_hours: 24,
            max_parallel_files: 4,
            progress_root: None,
            modify_source: true,
            prefix: "rec".to_string(),
        }
    }
}

impl RunConfig {
    pub fn speech_timeout(&self) -> Duration {
        Duration::from_secs(self.speech_timeout_secs)
    }

    pub fn evict_poll_bound(&self) -> Duration {
        Duration::from_secs(self.evict_poll_bound_secs)
    }

    /// Load defaults, then overlay a TOML file if present at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut cfg = RunConfig::default();
        if path.exists() {
            let text = std::fs::read_to_string(path)?;
            cfg = toml::from_str(&text)?;
        }
        Ok(cfg)
    }
}
