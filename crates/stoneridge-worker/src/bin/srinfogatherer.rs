//! Stage binary: reads the installed build's identity and writes
//! `out/info.json`.

use std::path::PathBuf;

use clap::Parser;
use gethostname::gethostname;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_worker::infogatherer::{gather, GatherPlan};
use stoneridge_worker::{netconfig_from, os_from, work_dir_from};

#[derive(Parser, Debug)]
#[command(name = "srinfogatherer", version)]
struct Cli {
    #[arg(long)]
    config: PathBuf,
    #[arg(long)]
    runconfig: PathBuf,
    /// Append tracing output to this file in addition to stderr.
    #[arg(long)]
    log: Option<PathBuf>,
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

    let (netconfig, os) = match (netconfig_from(&config), os_from(&config)) {
        (Ok(n), Ok(o)) => (n, o),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "invalid run config");
            std::process::exit(1);
        }
    };
    let work_dir = work_dir_from(&config);
    let firefox_path = config.get_string("machine", "firefox_path", "firefox");
    let os_version = config.get_string("machine", "os_version", "");
    let cpu_family = config.get_string("machine", "cpu_family", "");
    let tstamp = config.get_int("run", "tstamp", 0);
    let hostname = gethostname().to_string_lossy().into_owned();

    let plan = GatherPlan {
        bindir: &work_dir.firefox_install_dir(&firefox_path),
        netconfig,
        os,
        os_version: &os_version,
        hostname: &hostname,
        cpu_family: &cpu_family,
        tstamp,
    };

    if let Err(e) = gather(&plan, &work_dir.out_dir()) {
        tracing::error!(error = %e, "infogatherer failed");
        std::process::exit(1);
    }
}
