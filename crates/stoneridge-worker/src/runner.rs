//! Drives the xpcshell (`.js`) and page-load (`.page`) test suites.
//! Grounded on the upstream `srrunner` agent/`srrun` for the
//! xpcshell argument sequence; the `.page` harness passes its
//! harness-specific option set as a JSON blob written to the launcher's
//! stdin.

use std::path::{Path, PathBuf};
use std::time::Duration;

use stoneridge_types::{Result, StoneRidgeError};

/// Discover the `.js` tests under `testroot`, excluding `fake.js` (the
/// harness's own self-test fixture), unless a specific subset was
/// requested.
pub fn build_testlist(testroot: &Path, requested: &[String]) -> Result<Vec<String>> {
    if requested.is_empty() {
        let mut tests = Vec::new();
        for entry in std::fs::read_dir(testroot)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("reading {}: {e}", testroot.display())))?
        {
            let entry = entry.map_err(|e| StoneRidgeError::Other(anyhow::anyhow!(e)))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".js") && name != "fake.js" {
                tests.push(name);
            }
        }
        tests.sort();
        return Ok(tests);
    }

    let mut tests = Vec::new();
    for candidate in requested {
        if !candidate.ends_with(".js") {
            tracing::error!(candidate, "invalid test filename");
            continue;
        }
        if !testroot.join(candidate).exists() {
            tracing::error!(candidate, "missing test");
            continue;
        }
        tests.push(candidate.clone());
    }
    Ok(tests)
}

/// Build the xpcshell argument vector for one `.js` test, matching
/// `srrunner`'s `_build_preargs` + per-test argument assembly exactly.
pub fn xpcshell_args(installroot: &Path, testroot: &Path, test: &str, heads: &[PathBuf], xpcoutleaf: &str) -> Vec<String> {
    let outfile = format!("{test}.out");
    let mut args = vec!["-v".to_string(), "180".to_string()];
    for head in heads {
        args.push("-f".to_string());
        args.push(head.display().to_string());
    }
    args.push("-e".to_string());
    args.push(format!("const _SR_OUT_SUBDIR = \"{xpcoutleaf}\";"));
    args.push("-e".to_string());
    args.push(format!("const _SR_OUT_FILE = \"{outfile}\";"));
    args.push("-f".to_string());
    args.push(installroot.join("head.js").display().to_string());
    args.push("-f".to_string());
    args.push(testroot.join(test).display().to_string());
    args.push("-e".to_string());
    args.push("do_stoneridge(); quit(0);".to_string());
    args
}

/// Run every `.js` test in `tests` through xpcshell, one subprocess per
/// test, writing its log alongside `out_dir`. A single test's timeout or
/// non-zero exit is logged and that test is left without results; it never
/// aborts the remaining tests or the stage itself.
pub fn run_js_tests(
    xpcshell_bin: &Path,
    installroot: &Path,
    testroot: &Path,
    tests: &[String],
    heads: &[PathBuf],
    xpcoutleaf: &str,
    out_dir: &Path,
    timeout: Duration,
) -> Result<()> {
    for test in tests {
        let args = xpcshell_args(installroot, testroot, test, heads, xpcoutleaf);
        let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();
        let log_path = out_dir.join(format!("{test}.xpcshell.log"));
        if let Err(e) = stoneridge_process::run_stage(
            "xpcshell",
            &xpcshell_bin.to_string_lossy(),
            &args_ref,
            out_dir,
            &log_path,
            timeout,
        ) {
            tracing::error!(test, error = %e, "test failed, continuing with remaining tests");
        }
    }
    Ok(())
}

/// Run one `.page` test: the harness-specific option set is serialized as
/// JSON and piped to the launcher's stdin, since `.page` tests drive a full
/// browser window rather than an xpcshell script.
pub fn run_page_test(
    launcher: &Path,
    options: &serde_json::Value,
    working_dir: &Path,
    log_path: &Path,
    timeout: Duration,
) -> Result<()> {
    use std::io::{Read, Write};

    let mut child = std::process::Command::new(launcher)
        .current_dir(working_dir)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to spawn page test launcher: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        let payload = serde_json::to_vec(options)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to serialize page options: {e}")))?;
        stdin
            .write_all(&payload)
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to write page options: {e}")))?;
    }

    let start = std::time::Instant::now();
    let deadline = start + timeout;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("failed to poll page test launcher: {e}")))?
        {
            let mut combined = String::new();
            if let Some(mut s) = child.stdout.take() {
                let _ = s.read_to_string(&mut combined);
            }
            if let Some(mut s) = child.stderr.take() {
                let _ = s.read_to_string(&mut combined);
            }
            std::fs::write(log_path, &combined)
                .map_err(|e| StoneRidgeError::Other(anyhow::anyhow!("writing {}: {e}", log_path.display())))?;

            if status.success() {
                return Ok(());
            }
            return Err(StoneRidgeError::StageFailed {
                stage: "page_test".to_string(),
                exit_code: status.code(),
                log_path: log_path.display().to_string(),
            });
        }
        if std::time::Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(StoneRidgeError::TestTimeout(format!(
                "page test exceeded {}",
                humantime::format_duration(timeout)
            )));
        }
        std::thread::sleep(Duration::from_millis(200));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_testlist_discovers_js_tests_and_skips_fake() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.js"), b"").unwrap();
        std::fs::write(tmp.path().join("b.js"), b"").unwrap();
        std::fs::write(tmp.path().join("fake.js"), b"").unwrap();
        std::fs::write(tmp.path().join("readme.txt"), b"").unwrap();

        let tests = build_testlist(tmp.path(), &[]).unwrap();
        assert_eq!(tests, vec!["a.js".to_string(), "b.js".to_string()]);
    }

    #[test]
    fn build_testlist_filters_requested_to_existing_js_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("present.js"), b"").unwrap();

        let tests = build_testlist(
            tmp.path(),
            &["present.js".to_string(), "missing.js".to_string(), "bad.txt".to_string()],
        )
        .unwrap();
        assert_eq!(tests, vec!["present.js".to_string()]);
    }

    #[test]
    fn xpcshell_args_include_out_subdir_and_file_defines() {
        let args = xpcshell_args(Path::new("/install"), Path::new("/tests"), "sample.js", &[], "leaf");
        assert!(args.contains(&"const _SR_OUT_SUBDIR = \"leaf\";".to_string()));
        assert!(args.contains(&"const _SR_OUT_FILE = \"sample.js.out\";".to_string()));
        assert!(args.contains(&"do_stoneridge(); quit(0);".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn run_js_tests_continues_past_a_failing_test() {
        let tmp = tempfile::tempdir().unwrap();
        let testroot = tmp.path().join("tests");
        std::fs::create_dir_all(&testroot).unwrap();
        std::fs::write(testroot.join("good.js"), b"").unwrap();
        std::fs::write(testroot.join("bad.js"), b"").unwrap();
        let installroot = tmp.path().join("install");
        std::fs::create_dir_all(&installroot).unwrap();
        std::fs::write(installroot.join("head.js"), b"").unwrap();
        let out_dir = tmp.path().join("out");
        std::fs::create_dir_all(&out_dir).unwrap();

        let fake_xpcshell = tmp.path().join("fake_xpcshell.sh");
        std::fs::write(
            &fake_xpcshell,
            "#!/bin/sh\nfor a in \"$@\"; do case \"$a\" in *bad.js) exit 1;; esac; done\nexit 0\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&fake_xpcshell).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&fake_xpcshell, perms).unwrap();
        }

        let result = run_js_tests(
            &fake_xpcshell,
            &installroot,
            &testroot,
            &["good.js".to_string(), "bad.js".to_string()],
            &[],
            "xpcoutput",
            &out_dir,
            Duration::from_secs(5),
        );
        assert!(result.is_ok(), "a failing test must not abort the stage");
    }
}
