//! System diagnostics and dependency checking.
//!
//! Verifies that the external programs the pipeline shells out to are
//! installed and reachable.

use crate::config::Config;
use crate::error::PrepError;
use crate::process::{CommandSpec, ProcessRunner};
use std::path::Path;

/// Result of a dependency check.
#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Tool is installed and working
    Ok,
    /// Tool is not found
    NotFound,
    /// Tool is found but has issues
    Warning(String),
    /// Optional tool that is not configured
    Skipped,
}

/// One line of the dependency report.
#[derive(Debug)]
pub struct Check {
    pub name: String,
    pub result: CheckResult,
    pub hint: Option<&'static str>,
}

/// Check if a command exists and answers `--version`.
pub fn check_command(runner: &dyn ProcessRunner, program: &str) -> CheckResult {
    match runner.run(&CommandSpec::new(program).arg("--version")) {
        Ok(output) if output.success => CheckResult::Ok,
        Ok(_) => CheckResult::Warning(format!("'{}' found but --version failed", program)),
        Err(PrepError::ToolNotFound { .. }) => CheckResult::NotFound,
        Err(e) => CheckResult::Warning(format!("Error checking '{}': {}", program, e)),
    }
}

/// Check that a configured file exists.
pub fn check_file(path: &Path) -> CheckResult {
    if path.is_file() {
        CheckResult::Ok
    } else {
        CheckResult::NotFound
    }
}

/// Run every dependency check for `config`.
pub fn run_checks(runner: &dyn ProcessRunner, config: &Config) -> Vec<Check> {
    let mut checks = vec![Check {
        name: format!("aligner ({})", config.aligner.program),
        result: check_command(runner, &config.aligner.program),
        hint: Some("Set [aligner] program or WAV2TRAIN_ALIGNER"),
    }];

    if !config.aligner.script.is_empty() {
        let script = match &config.aligner.working_dir {
            Some(dir) => dir.join(&config.aligner.script),
            None => Path::new(&config.aligner.script).to_path_buf(),
        };
        checks.push(Check {
            name: format!("aligner script ({})", script.display()),
            result: check_file(&script),
            hint: Some("Set [aligner] script and working_dir to your DSAlign checkout"),
        });
    }

    checks.push(Check {
        name: format!("sox ({})", config.audio.sox),
        result: check_command(runner, &config.audio.sox),
        hint: Some("Install: sudo apt install sox libsox-fmt-all"),
    });

    let scorer = match &config.scorer.binary {
        Some(binary) => check_file(binary),
        None => CheckResult::Skipped,
    };
    checks.push(Check {
        name: "wav2letter Test (ASR filter)".to_string(),
        result: scorer,
        hint: Some("Set [scorer] binary to the wav2letter Test executable"),
    });

    checks
}

/// Print a report of `checks`. Returns false if a required tool is missing.
pub fn print_report(checks: &[Check]) -> bool {
    println!("Checking system dependencies...\n");

    let mut all_ok = true;
    for check in checks {
        print!("{}: ", check.name);
        match &check.result {
            CheckResult::Ok => println!("✓ OK"),
            CheckResult::NotFound => {
                all_ok = false;
                println!("✗ NOT FOUND");
                if let Some(hint) = check.hint {
                    println!("  {}", hint);
                }
            }
            CheckResult::Warning(msg) => println!("⚠ WARNING: {}", msg),
            CheckResult::Skipped => println!("- not configured"),
        }
    }

    println!();
    if all_ok {
        println!("All required dependencies found.");
    } else {
        println!("Some dependencies are missing.");
    }
    all_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MockProcessRunner, ProcessOutput};
    use std::fs;
    use tempfile::TempDir;

    fn runner_missing(missing: &'static str) -> MockProcessRunner {
        MockProcessRunner::new(move |spec| {
            if spec.program == missing {
                Err(PrepError::ToolNotFound {
                    tool: spec.program.clone(),
                })
            } else {
                Ok(ProcessOutput::ok("v1.0"))
            }
        })
    }

    #[test]
    fn test_check_command_ok() {
        let runner = MockProcessRunner::succeeding();
        assert_eq!(check_command(&runner, "sox"), CheckResult::Ok);
        assert_eq!(runner.calls()[0].args, vec!["--version"]);
    }

    #[test]
    fn test_check_command_not_found() {
        let runner = runner_missing("sox");
        assert_eq!(check_command(&runner, "sox"), CheckResult::NotFound);
    }

    #[test]
    fn test_check_command_failing_version() {
        let runner = MockProcessRunner::new(|_| Ok(ProcessOutput::failed(1, "usage")));
        assert!(matches!(
            check_command(&runner, "python"),
            CheckResult::Warning(_)
        ));
    }

    #[test]
    fn test_run_checks_with_defaults() {
        let runner = runner_missing("sox");
        let checks = run_checks(&runner, &Config::default());
        assert_eq!(checks.len(), 4);
        assert_eq!(checks[0].result, CheckResult::Ok);
        // default script is relative and not present in the test cwd
        assert_eq!(checks[1].result, CheckResult::NotFound);
        assert_eq!(checks[2].result, CheckResult::NotFound);
        assert_eq!(checks[3].result, CheckResult::Skipped);
        assert!(!print_report(&checks));
    }

    #[test]
    fn test_run_checks_resolves_script_in_working_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("align")).unwrap();
        fs::write(dir.path().join("align/align.py"), "").unwrap();
        let binary = dir.path().join("Test");
        fs::write(&binary, "").unwrap();

        let mut config = Config::default();
        config.aligner.working_dir = Some(dir.path().to_path_buf());
        config.scorer.binary = Some(binary);

        let runner = MockProcessRunner::succeeding();
        let checks = run_checks(&runner, &config);
        assert!(checks.iter().all(|c| c.result == CheckResult::Ok));
        assert!(print_report(&checks));
    }
}
