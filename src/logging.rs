//! Logging configuration for taketake.
//!
//! Logs are written to both the terminal and a file at:
//! `~/Library/Logs/taketake/taketake.log` (macOS) or the platform's local
//! data directory elsewhere. The file is the thing worth attaching to a bug
//! report after a failed run.

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

/// Get the log directory path.
/// On macOS: ~/Library/Logs/taketake/
pub fn get_log_directory() -> Option<PathBuf> {
    if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Logs").join("taketake"))
    } else {
        dirs::data_local_dir().map(|d| d.join("taketake").join("logs"))
    }
}

/// Get the current log file path.
pub fn get_log_file_path() -> Option<PathBuf> {
    get_log_directory().map(|d| d.join("taketake.log"))
}

/// Map `-v` stack count to a terminal level: 0 = Info, 1 = Debug, 2+ = Trace.
/// The file logger always stays at Debug or finer so a bug report captures
/// detail the operator didn't ask to see on their screen.
fn verbosity_to_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Initialize combined terminal + file logging. `verbose` is the `-v` stack
/// count; `log_file_override` replaces the platform-default log path when
/// set. Returns the log file path on success.
pub fn init_logging(verbose: u8, log_file_override: Option<PathBuf>) -> Option<PathBuf> {
    let term_level = verbosity_to_level(verbose);

    let log_path = match log_file_override {
        Some(p) => p,
        None => match get_log_file_path() {
            Some(p) => p,
            None => {
                eprintln!("Warning: Could not determine log directory");
                init_terminal_only(term_level);
                return None;
            }
        },
    };

    if let Some(log_dir) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(log_dir) {
            eprintln!("Warning: Could not create log directory: {e}");
            init_terminal_only(term_level);
            return None;
        }
    }

    if let Ok(metadata) = fs::metadata(&log_path) {
        if metadata.len() > 10 * 1024 * 1024 {
            let backup_path = log_path.with_extension("log.old");
            let _ = fs::rename(&log_path, &backup_path);
        }
    }

    let log_file = match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {e}");
            init_terminal_only(term_level);
            return None;
        }
    };

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    let loggers: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(term_level, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Debug.max(term_level), config, log_file),
    ];

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Warning: Logger already initialized");
    }

    log::info!("=== taketake run started ===");
    log::info!("Log file: {}", log_path.display());

    Some(log_path)
}

/// Terminal-only fallback, used when the log directory or file can't be
/// opened.
fn init_terminal_only(term_level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    let term_logger = TermLogger::new(term_level, config, TerminalMode::Mixed, ColorChoice::Auto);
    let _ = CombinedLogger::init(vec![term_logger]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_directory_contains_app_name() {
        let dir = get_log_directory().unwrap();
        assert!(dir.to_string_lossy().contains("taketake"));
    }

    #[test]
    fn log_file_path_is_inside_log_directory() {
        let dir = get_log_directory().unwrap();
        let file = get_log_file_path().unwrap();
        assert!(file.starts_with(&dir));
        assert!(file.to_string_lossy().ends_with("taketake.log"));
    }

    #[test]
    fn verbosity_stacks_from_info_to_trace() {
        assert_eq!(verbosity_to_level(0), LevelFilter::Info);
        assert_eq!(verbosity_to_level(1), LevelFilter::Debug);
        assert_eq!(verbosity_to_level(2), LevelFilter::Trace);
        assert_eq!(verbosity_to_level(9), LevelFilter::Trace);
    }
}
