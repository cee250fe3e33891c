//! Stage binary: drives the `.js` xpcshell test suite (and, optionally, an
//! explicit subset passed as positional arguments), with tcpdump capture
//! running alongside each test when configured.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_worker::runner::{build_testlist, run_js_tests};
use stoneridge_worker::work_dir_from;

#[derive(Parser, Debug)]
#[command(name = "srrunner", version)]
struct Cli {
    #[arg(long)]
    config: PathBuf,
    #[arg(long)]
    runconfig: PathBuf,
    /// Append tracing output to this file in addition to stderr.
    #[arg(long)]
    log: Option<PathBuf>,
    #[arg(long = "head")]
    heads: Vec<PathBuf>,
    tests: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = stoneridge_config::init_logging(cli.log.as_deref()).expect("failed to init logging");

    let config = match StoneRidgeConfig::load_with_overlay(&cli.config, &cli.runconfig) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let work_dir = work_dir_from(&config);
    let testroot = PathBuf::from(config.get_string("stoneridge", "testroot", "tests"));
    let installroot = PathBuf::from(config.get_string("stoneridge", "root", "."));
    let firefox_path = config.get_string("machine", "firefox_path", "firefox");
    let xpcshell_bin_name = config.get_string("machine", "xpcshell_bin", "xpcshell");
    let xpcoutleaf = config.get_string("run", "xpcoutleaf", "xpcoutput");
    let timeout_secs = config.get_int("stoneridge", "test_timeout_secs", 200).max(1) as u64;

    let tests = match build_testlist(&testroot, &cli.tests) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "failed to build test list");
            std::process::exit(1);
        }
    };

    let out_dir = work_dir.out_dir();
    let xpcoutdir = out_dir.join(&xpcoutleaf);
    if let Err(e) = std::fs::create_dir_all(&xpcoutdir) {
        tracing::error!(error = %e, path = %xpcoutdir.display(), "failed to create xpcshell output directory");
        std::process::exit(1);
    }

    let tcpdump_exe = config.get_string("tcpdump", "exe", "");
    let tcpdump_if = config.get_string("tcpdump", "interface", "");
    let mut tcpdump = None;
    if !tcpdump_exe.is_empty() && !tcpdump_if.is_empty() {
        let capture_path = out_dir.join("traffic.pcap");
        match std::process::Command::new(&tcpdump_exe)
            .args(["-s", "2000", "-U", "-p", "-w"])
            .arg(&capture_path)
            .args(["-i", &tcpdump_if])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
        {
            Ok(child) => tcpdump = Some(child),
            Err(e) => tracing::warn!(error = %e, "failed to start tcpdump, continuing without capture"),
        }
    }

    let xpcshell_bin = work_dir.firefox_install_dir(&firefox_path).join(&xpcshell_bin_name);
    let result = run_js_tests(
        &xpcshell_bin,
        &installroot,
        &testroot,
        &tests,
        &cli.heads,
        &xpcoutleaf,
        &out_dir,
        Duration::from_secs(timeout_secs),
    );

    if let Some(mut child) = tcpdump {
        let _ = child.kill();
        let _ = child.wait();
    }

    if let Err(e) = result {
        tracing::error!(error = %e, "runner failed");
        std::process::exit(1);
    }
}
