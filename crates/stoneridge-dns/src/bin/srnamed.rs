//! DNS agent daemon (spec §4.9): binds the wire-protocol TCP listener and
//! serves requests one at a time for the lifetime of the process.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_dns::backend_for_platform;

#[derive(Parser, Debug)]
#[command(name = "srnamed", version)]
struct Cli {
    #[arg(long, default_value = "stoneridge.toml")]
    config: PathBuf,

    /// Append tracing output to this file in addition to stderr.
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(flatten)]
    daemon: stoneridge_config::DaemonArgs,
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = stoneridge_config::init_logging(cli.log.as_deref()).expect("failed to init logging");
    let _pidfile_guard = cli.daemon.install_pidfile().expect("failed to install pidfile");

    let config = match StoneRidgeConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let addr = config.get_string("dns", "agent_addr", "127.0.0.1:63250");
    let run_dir = PathBuf::from(config.get_string("stoneridge", "run", "/var/stoneridge/run"));
    if let Err(e) = std::fs::create_dir_all(&run_dir) {
        tracing::error!(error = %e, dir = %run_dir.display(), "failed to create run directory");
        std::process::exit(1);
    }

    let backend = backend_for_platform(&run_dir);
    if let Err(e) = stoneridge_dns::serve(&addr, backend.as_ref()) {
        tracing::error!(error = %e, "dns agent exited");
        std::process::exit(1);
    }
}
