use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use stoneridge_bus::AmqpBus;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_types::request::{NetConfig, OperatingSystem, RunRequest};

#[derive(Parser, Debug)]
#[command(name = "srdeferrer", version)]
struct Cli {
    #[arg(long, default_value = "stoneridge.toml")]
    config: PathBuf,

    #[arg(long)]
    srid: String,

    #[arg(long)]
    attempt: u32,

    #[arg(long)]
    interval: u64,

    #[arg(long, default_value = "")]
    ldap: String,

    #[arg(long, default_value = "")]
    sha: String,

    #[arg(long)]
    nightly: bool,

    #[arg(long = "os")]
    operating_systems: Vec<OperatingSystem>,

    #[arg(long = "netconfig")]
    netconfigs: Vec<NetConfig>,

    /// Append tracing output to this file in addition to stderr. Worth
    /// setting here since the master spawns this process detached, with
    /// no captured stdout/stderr of its own.
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
    let bus_url = config.get_string("bus", "url", "amqp://127.0.0.1:5672");
    let bus = match AmqpBus::connect(&bus_url) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to bus");
            std::process::exit(1);
        }
    };

    let request = RunRequest {
        srid: cli.srid,
        nightly: cli.nightly,
        ldap: cli.ldap,
        sha: cli.sha,
        operating_systems: cli.operating_systems,
        netconfigs: cli.netconfigs,
        attempt: cli.attempt,
        tstamp: None,
    };

    if let Err(e) = stoneridge_deferrer::run(&request, Duration::from_secs(cli.interval), &bus, &mut || false) {
        tracing::error!(error = %e, "deferrer failed");
        std::process::exit(1);
    }
}
