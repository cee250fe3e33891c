//! Stage binary: publishes every pending `upload_<suite>.json` to the
//! results queue.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_bus::AmqpBus;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_worker::uploader::{discover_suites, upload};
use stoneridge_worker::{netconfig_from, os_from, srid_from, work_dir_from};

#[derive(Parser, Debug)]
#[command(name = "sruploader", version)]
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

    let srid = srid_from(&config);
    let work_dir = work_dir_from(&config);
    let out_dir = work_dir.out_dir();
    let bus_url = config.get_string("bus", "url", "amqp://127.0.0.1:5672");
    let netconfig = match netconfig_from(&config) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "invalid netconfig");
            std::process::exit(1);
        }
    };
    let os = os_from(&config).map(|os| os.as_str()).unwrap_or("unknown");

    let suites = match discover_suites(&out_dir) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to discover upload files");
            std::process::exit(1);
        }
    };
    if suites.is_empty() {
        tracing::debug!("no file to upload");
        return;
    }

    let bus = match AmqpBus::connect(&bus_url) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to bus");
            std::process::exit(1);
        }
    };

    if let Err(e) = upload(&bus, &srid, netconfig.as_str(), os, &out_dir, &suites) {
        tracing::error!(error = %e, "uploader failed");
        std::process::exit(1);
    }
}
