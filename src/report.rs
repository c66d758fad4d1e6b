//! End-of-run reporting: one outcome per file plus the process exit code.

use crate::error::EngineError;
use crate::model::Stage;

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub source_path: std::path::PathBuf,
    pub basename: Option<String>,
    pub failed: Option<(Stage, EngineError)>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.failed.is_none()
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
    pub aborted: bool,
}

impl RunReport {
    pub fn any_failed(&self) -> bool {
        self.aborted || self.outcomes.iter().any(|o| !o.succeeded())
    }

    /// 0 iff every file succeeded and the run was not aborted.
    pub fn exit_code(&self) -> i32 {
        if self.any_failed() { 1 } else { 0 }
    }

    /// Render the per-file outcome table shown to the operator at end of run.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.outcomes.is_empty() {
            out.push_str("no files found\n");
            return out;
        }
        for o in &self.outcomes {
            let name = o
                .basename
                .clone()
                .unwrap_or_else(|| o.source_path.display().to_string());
            match &o.failed {
                None => out.push_str(&format!("OK    {name}\n")),
                Some((stage, err)) => out.push_str(&format!(
                    "FAIL  {name}  at {} ({})\n",
                    stage.name(),
                    err.kind_name()
                )),
            }
        }
        if self.any_failed() {
            out.push_str(
                "\nsome files did not complete; re-run to resume from the preserved progress directory\n",
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn exit_code_zero_when_all_succeed() {
        let report = RunReport {
            outcomes: vec![FileOutcome {
                source_path: PathBuf::from("a.wav"),
                basename: Some("a".into()),
                failed: None,
            }],
            aborted: false,
        };
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn exit_code_nonzero_on_failure() {
        let report = RunReport {
            outcomes: vec![FileOutcome {
                source_path: PathBuf::from("a.wav"),
                basename: None,
                failed: Some((Stage::XDelta, EngineError::XdeltaMismatch)),
            }],
            aborted: false,
        };
        assert_eq!(report.exit_code(), 1);
        assert!(report.render().contains("XdeltaMismatch"));
    }

    #[test]
    fn aborted_run_is_nonzero_even_with_no_failures() {
        let report = RunReport {
            outcomes: vec![],
            aborted: true,
        };
        assert_eq!(report.exit_code(), 1);
    }
}
