//! Standalone cleaner daemon (spec §4.14): every 60 s, prune the work
//! directory down to the newest `keep` entries. The worker pipeline's
//! last-stage variant of the same pass lives in `stoneridge-worker`'s
//! `srcleaner` binary and calls this crate's `enforce` directly; this
//! binary is for deployments that run cleanup on a tick instead of as a
//! pipeline stage.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;

const TICK: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "srcleanerd", version)]
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

    let work_root = PathBuf::from(config.get_string("stoneridge", "work", "."));
    let keep = config.get_int("cleaner", "keep", 50).max(0) as usize;

    loop {
        match stoneridge_cleaner::enforce(&work_root, keep) {
            Ok(pruned) => {
                if !pruned.is_empty() {
                    tracing::info!(count = pruned.len(), "cleaner pruned retention entries");
                }
            }
            Err(e) => tracing::error!(error = %e, "cleaner tick failed"),
        }
        std::thread::sleep(TICK);
    }
}
