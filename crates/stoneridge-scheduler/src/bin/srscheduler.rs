use std::path::PathBuf;

use clap::Parser;
use stoneridge_bus::{AmqpBus, QueueListener};
use stoneridge_config::StoneRidgeConfig;
use stoneridge_scheduler::{dispatch, IncomingMessage};
use stoneridge_types::request::NetConfig;

#[derive(Parser, Debug)]
#[command(name = "srscheduler", version)]
struct Cli {
    #[arg(long, default_value = "stoneridge.toml")]
    config: PathBuf,

    #[arg(long)]
    netconfig: NetConfig,

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
    let bus_url = config.get_string("bus", "url", "amqp://127.0.0.1:5672");
    let bus = match AmqpBus::connect(&bus_url) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to bus");
            std::process::exit(1);
        }
    };

    let netconfig = cli.netconfig;
    let mut should_stop = || false;
    let result = bus.run(
        netconfig.queue_name(),
        &mut should_stop,
        &mut |body: &[u8]| -> stoneridge_types::Result<()> {
            let message: IncomingMessage = serde_json::from_slice(body).map_err(|e| {
                stoneridge_types::StoneRidgeError::InvalidRequest(format!("malformed scheduler message: {e}"))
            })?;
            dispatch(&message, netconfig, &bus)
        },
    );

    if let Err(e) = result {
        tracing::error!(netconfig = netconfig.as_str(), error = %e, "scheduler listener exited");
        std::process::exit(1);
    }
}
