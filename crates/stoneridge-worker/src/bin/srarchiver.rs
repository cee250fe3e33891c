//! Stage binary: zips `out/` into the configured archive directory.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_worker::archiver::archive;
use stoneridge_worker::work_dir_from;

#[derive(Parser, Debug)]
#[command(name = "srarchiver", version)]
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
    let archive_dir = PathBuf::from(config.get_string("archiver", "directory", "/var/stoneridge/archives"));
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    match archive(&work_dir.out_dir(), &archive_dir, now) {
        Ok(path) => tracing::info!(path = %path.display(), "archived run"),
        Err(e) => {
            tracing::error!(error = %e, "archiver failed");
            std::process::exit(1);
        }
    }
}
