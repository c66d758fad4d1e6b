//! Per-file data model.
//!
//! `FileInfo` is the immutable identity of one source recording: its
//! location, size, and mtime, plus the progress directory that scratch state
//! for every stage lives under. Everything mutable lives in `FileState`,
//! guarded by a `Mutex` that is only ever held across synchronous sections —
//! never across an `.await` — so the "one stage owns an index at a time"
//! discipline never has to fight the borrow checker.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use chrono::{NaiveDateTime, Weekday};

use crate::error::EngineError;

/// A wall-clock timestamp recognized from speech, with a confidence marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampGuess {
    pub when: NaiveDateTime,
    /// True when the recognizer was not confident (rendered as a `+?` suffix).
    pub low_confidence: bool,
}

impl TimestampGuess {
    pub fn weekday(&self) -> Weekday {
        self.when.date().weekday()
    }
}

/// One stage in the per-file pipeline. `Setup` and `Cleanup` bookend the five
/// stages described in the component design; `Finish` is not per-file (it
/// retires entries after `Cleanup`, so it is not tracked here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Setup,
    Listen,
    Prompt,
    FlacEnc,
    ParGen,
    XDelta,
    Cleanup,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Setup,
        Stage::Listen,
        Stage::Prompt,
        Stage::FlacEnc,
        Stage::ParGen,
        Stage::XDelta,
        Stage::Cleanup,
    ];

    fn index(self) -> usize {
        match self {
            Stage::Setup => 0,
            Stage::Listen => 1,
            Stage::Prompt => 2,
            Stage::FlacEnc => 3,
            Stage::ParGen => 4,
            Stage::XDelta => 5,
            Stage::Cleanup => 6,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stage::Setup => "setup",
            Stage::Listen => "listen",
            Stage::Prompt => "prompt",
            Stage::FlacEnc => "flacenc",
            Stage::ParGen => "pargen",
            Stage::XDelta => "xdelta",
            Stage::Cleanup => "cleanup",
        }
    }
}

/// Per-stage completion state for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Complete,
    Failed(EngineError),
}

/// Immutable identity of one source recording.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub index: usize,
    pub source_path: PathBuf,
    pub source_size: u64,
    pub source_mtime: SystemTime,
    pub progress_dir: PathBuf,
}

/// Mutable per-file fields, written only by the stage currently holding the
/// file's index.
#[derive(Debug, Default)]
pub struct FileState {
    pub guessed_timestamp: Option<TimestampGuess>,
    pub guessed_filename: Option<String>,
    pub provided_filename: Option<String>,
    pub duration: Option<f64>,
    pub notes: String,
    pub stage_status: [StageStatus; 7],
    /// First error encountered, with the stage that produced it.
    pub first_error: Option<(Stage, EngineError)>,
}

impl FileState {
    pub fn status(&self, stage: Stage) -> &StageStatus {
        &self.stage_status[stage.index()]
    }

    pub fn mark_running(&mut self, stage: Stage) {
        self.stage_status[stage.index()] = StageStatus::Running;
    }

    pub fn mark_complete(&mut self, stage: Stage) {
        self.stage_status[stage.index()] = StageStatus::Complete;
    }

    pub fn mark_failed(&mut self, stage: Stage, err: EngineError) {
        self.stage_status[stage.index()] = StageStatus::Failed(err.clone());
        if self.first_error.is_none() {
            self.first_error = Some((stage, err));
        }
    }

    pub fn has_failed(&self) -> bool {
        self.first_error.is_some()
    }
}

/// One file's identity plus its guarded mutable state, shared via `Arc`
/// across the stage tasks that touch it in sequence.
#[derive(Debug)]
pub struct FileEntry {
    pub info: FileInfo,
    pub state: Mutex<FileState>,
}

impl FileEntry {
    pub fn new(info: FileInfo) -> Self {
        Self {
            info,
            state: Mutex::new(FileState::default()),
        }
    }

    /// Final basename without the `.flac` suffix: the operator-provided name
    /// if curated, otherwise the speech-derived guess.
    pub fn best_basename(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .provided_filename
            .clone()
            .or_else(|| state.guessed_filename.clone())
    }
}
