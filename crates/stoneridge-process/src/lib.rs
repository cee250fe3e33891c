//! Subprocess execution for stoneridge's worker pipeline.
//!
//! Every stage of the worker pipeline (download, unpack, gather info, point
//! DNS, run the browser, collate, upload, archive, clean) is its own child
//! process rather than an in-process function call, so a stage that wedges
//! can be killed without taking the worker daemon down with it. Each stage
//! writes its combined stdout/stderr to a numbered log file under the run's
//! `out/logs/` directory (spec §8 "Stage log completeness").

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use stoneridge_types::StoneRidgeError;

/// Outcome of one stage's subprocess run.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
    pub log_path: std::path::PathBuf,
}

impl StageOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Run `program` with `args` in `working_dir`, polling for completion with a
/// fixed poll interval and killing the child if `timeout` elapses first.
/// Combined stdout/stderr is written to `log_path`. `log_path`'s parent
/// directory must already exist.
pub fn run_stage(
    stage: &str,
    program: &str,
    args: &[&str],
    working_dir: &Path,
    log_path: &Path,
    timeout: Duration,
) -> Result<StageOutcome, StoneRidgeError> {
    let start = Instant::now();

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to spawn stage '{stage}': {e}")))?;

    let deadline = Instant::now() + timeout;
    let outcome = loop {
        match child.try_wait().map_err(|e| {
            StoneRidgeError::Other(anyhow::anyhow!("failed to poll stage '{stage}': {e}"))
        })? {
            Some(status) => {
                break StageOutcome {
                    exit_code: status.code(),
                    timed_out: false,
                    duration: start.elapsed(),
                    log_path: log_path.to_path_buf(),
                };
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    break StageOutcome {
                        exit_code: None,
                        timed_out: true,
                        duration: start.elapsed(),
                        log_path: log_path.to_path_buf(),
                    };
                }
                std::thread::sleep(Duration::from_millis(200));
            }
        }
    };

    write_log(log_path, stage, &mut child, timeout, outcome.timed_out)
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to write stage log: {e}")))?;

    if outcome.timed_out {
        return Err(StoneRidgeError::TestTimeout(format!(
            "stage '{stage}' exceeded {}",
            humantime::format_duration(timeout)
        )));
    }
    if outcome.exit_code != Some(0) {
        return Err(StoneRidgeError::StageFailed {
            stage: stage.to_string(),
            exit_code: outcome.exit_code,
            log_path: log_path.display().to_string(),
        });
    }
    Ok(outcome)
}

fn write_log(
    log_path: &Path,
    stage: &str,
    child: &mut std::process::Child,
    timeout: Duration,
    timed_out: bool,
) -> std::io::Result<()> {
    let mut file = std::fs::File::create(log_path)?;
    writeln!(file, "=== stage: {stage} ===")?;

    let mut stdout = String::new();
    if let Some(mut s) = child.stdout.take() {
        let _ = s.read_to_string(&mut stdout);
    }
    let mut stderr = String::new();
    if let Some(mut s) = child.stderr.take() {
        let _ = s.read_to_string(&mut stderr);
    }

    writeln!(file, "--- stdout ---")?;
    file.write_all(stdout.as_bytes())?;
    writeln!(file, "--- stderr ---")?;
    file.write_all(stderr.as_bytes())?;
    if timed_out {
        writeln!(
            file,
            "--- stage killed after exceeding timeout of {} ---",
            humantime::format_duration(timeout)
        )?;
    }
    Ok(())
}

/// Check if `program` exists in `PATH`.
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_stage_produces_log_and_zero_exit() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("01_echo_broadband.log");
        let outcome = run_stage(
            "echo",
            "sh",
            &["-c", "echo hello"],
            tmp.path(),
            &log_path,
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(outcome.success());
        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("hello"));
    }

    #[test]
    fn failing_stage_surfaces_stage_failed() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("02_fail_broadband.log");
        let err = run_stage(
            "fail",
            "sh",
            &["-c", "exit 7"],
            tmp.path(),
            &log_path,
            Duration::from_secs(5),
        )
        .unwrap_err();
        match err {
            StoneRidgeError::StageFailed { stage, exit_code, .. } => {
                assert_eq!(stage, "fail");
                assert_eq!(exit_code, Some(7));
            }
            other => panic!("expected StageFailed, got {other:?}"),
        }
    }

    #[test]
    fn timed_out_stage_is_killed_and_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let log_path = tmp.path().join("03_slow_broadband.log");
        let err = run_stage(
            "slow",
            "sh",
            &["-c", "sleep 30"],
            tmp.path(),
            &log_path,
            Duration::from_millis(200),
        )
        .unwrap_err();
        assert!(matches!(err, StoneRidgeError::TestTimeout(_)));
    }
}
