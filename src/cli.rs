//! Command-line surface. The engine's own collaborator has no CLI of its
//! own to borrow conventions from, so this follows the `clap::Parser`
//! derive style used elsewhere in the retrieved pack (rich `#[arg(...)]`
//! annotations, `anyhow` at the boundary).

use std::path::PathBuf;

use clap::Parser;

/// Transfer recordings from a source medium to a destination directory,
/// converting to FLAC with par2 parity and verifying byte-equivalence
/// before touching the source.
#[derive(Debug, Parser)]
#[command(name = "taketake", version, about)]
pub struct Args {
    /// Directory containing the source `.wav` files (e.g. a mounted USB drive).
    pub source_dir: PathBuf,

    /// Destination directory that receives the final `.flac` + `.par2` set.
    pub dest_dir: PathBuf,

    /// Leave the source `.wav` files untouched (implies no `flacs/` copy-back).
    #[arg(long)]
    pub no_modify_source: bool,

    /// Prefix used in the generated filename (default instrument/device tag).
    #[arg(long, default_value = "rec")]
    pub prefix: String,

    /// Optional path to a TOML config file layered over the built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Per-file speech-recognition timeout, in seconds.
    #[arg(long)]
    pub speech_timeout_secs: Option<u64>,

    /// Number of files allowed through the flac/par2/xdelta stages at once.
    #[arg(long)]
    pub max_parallel_files: Option<usize>,

    /// Increase log verbosity (stackable: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Override the default log file location.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Overlay the parsed flags onto a base `RunConfig` (defaults, possibly
    /// already overridden by a TOML file).
    pub fn apply(&self, mut config: crate::config::RunConfig) -> crate::config::RunConfig {
        config.source_dir = self.source_dir.clone();
        config.dest_dir = self.dest_dir.clone();
        config.modify_source = !self.no_modify_source;
        config.prefix = self.prefix.clone();
        if let Some(t) = self.speech_timeout_secs {
            config.speech_timeout_secs = t;
        }
        if let Some(n) = self.max_parallel_files {
            config.max_parallel_files = n;
        }
        config
    }
}
