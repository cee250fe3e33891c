//! Stage binary: downloads the firefox distribution and tests.zip for this
//! run into the work directory's `download/` subdirectory.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_cloner::HttpsFetcher;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_worker::downloader::{download, DownloadPlan};
use stoneridge_worker::{srid_from, work_dir_from};

#[derive(Parser, Debug)]
#[command(name = "srdownloader", version)]
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

    let server = config.get_string("download", "server", "");
    let root = config.get_string("download", "root", "");
    let platform = config.get_string("machine", "download_platform", "");
    let distribution_suffix = config.get_string("machine", "download_suffix", "");
    let srid = srid_from(&config);
    let work_dir = work_dir_from(&config);

    let plan = DownloadPlan {
        server: &server,
        root: &root,
        srid: &srid,
        platform: &platform,
        distribution_suffix: &distribution_suffix,
    };
    let fetcher = HttpsFetcher::new();

    if let Err(e) = download(&fetcher, &plan, &work_dir.download_dir()) {
        tracing::error!(error = %e, "downloader failed");
        std::process::exit(1);
    }
}
