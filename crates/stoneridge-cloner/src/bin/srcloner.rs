use std::path::PathBuf;

use clap::Parser;
use stoneridge_cloner::{clone, CloneRequest, HttpsFetcher, SuppaFtpLister};
use stoneridge_config::StoneRidgeConfig;
use stoneridge_types::request::OperatingSystem;
use stoneridge_types::StoneRidgeError;

/// Fetch one SRID's builds and test bundles from the upstream mirror.
///
/// Exit codes: 0 on success, 2 when the upstream build isn't published yet
/// (the caller should defer the run), 1 for any other failure.
#[derive(Parser, Debug)]
#[command(name = "srcloner", version)]
struct Cli {
    #[arg(long, default_value = "stoneridge.toml")]
    config: PathBuf,

    #[arg(long)]
    runconfig: Option<PathBuf>,

    #[arg(long)]
    srid: String,

    #[arg(long)]
    path: String,

    #[arg(long)]
    nightly: bool,

    #[arg(long = "os", value_delimiter = ',')]
    operating_systems: Vec<OperatingSystem>,

    /// Append tracing output to this file in addition to stderr. Usually
    /// left unset since the invoking master already redirects this
    /// process's stdout/stderr to its own per-run log file.
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(flatten)]
    daemon: stoneridge_config::DaemonArgs,
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = stoneridge_config::init_logging(cli.log.as_deref()).expect("failed to init logging");
    let _pidfile_guard = cli.daemon.install_pidfile().expect("failed to install pidfile");

    let config = match cli.runconfig.as_deref() {
        Some(overlay) => StoneRidgeConfig::load_with_overlay(&cli.config, overlay),
        None => StoneRidgeConfig::load(&cli.config),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let host = config.get_string("cloner", "host", "ftp.mozilla.org");
    let outroot = config.get_string("cloner", "output", "/var/stoneridge/downloads");
    let keep = config.get_int("server", "keep", 50).max(0) as usize;

    let request = CloneRequest {
        host: &host,
        path: &cli.path,
        nightly: cli.nightly,
        srid: &cli.srid,
        operating_systems: &cli.operating_systems,
        outroot: std::path::Path::new(&outroot),
    };

    let lister = SuppaFtpLister::new(host.clone());
    let fetcher = HttpsFetcher::new();

    match clone(&lister, &fetcher, &request, keep) {
        Ok(()) => tracing::info!(srid = %cli.srid, "clone complete"),
        Err(StoneRidgeError::UpstreamUnavailable(msg)) => {
            tracing::warn!(srid = %cli.srid, reason = %msg, "upstream build not ready, deferring");
            std::process::exit(2);
        }
        Err(e) => {
            tracing::error!(srid = %cli.srid, error = %e, "clone failed");
            std::process::exit(1);
        }
    }
}
