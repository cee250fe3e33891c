//! Stage binary: flattens `out/*.out` into `out/upload_<suite>.json` files.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_worker::collator::collate;
use stoneridge_worker::work_dir_from;

#[derive(Parser, Debug)]
#[command(name = "srcollator", version)]
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

    let work_dir = work_dir_from(&config);
    match collate(&work_dir.out_dir()) {
        Ok(suites) => tracing::info!(count = suites.len(), "collated suites"),
        Err(e) => {
            tracing::error!(error = %e, "collator failed");
            std::process::exit(1);
        }
    }
}
