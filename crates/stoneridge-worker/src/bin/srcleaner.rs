//! Stage binary: a single retention pass over the work root, run as the
//! pipeline's last stage. The long-running daemon that repeats this on a
//! tick lives in `stoneridge-cleaner` itself (spec §4.14).

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_worker::cleaner::clean_once;

#[derive(Parser, Debug)]
#[command(name = "srcleaner", version)]
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

    let work_root = PathBuf::from(config.get_string("stoneridge", "work", "."));
    let keep = config.get_int("cleaner", "keep", 50).max(0) as usize;

    match clean_once(&work_root, keep) {
        Ok(pruned) => tracing::info!(count = pruned.len(), "cleaner pruned retention entries"),
        Err(e) => {
            tracing::error!(error = %e, "cleaner failed");
            std::process::exit(1);
        }
    }
}
