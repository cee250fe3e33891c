use std::path::PathBuf;

use clap::Parser;
use stoneridge_bus::{AmqpBus, QueueListener};
use stoneridge_config::StoneRidgeConfig;
use stoneridge_master::{handle, SubprocessClonerInvoker, SubprocessDeferrerInvoker};
use stoneridge_types::request::RunRequest;

const INTAKE_QUEUE: &str = "intake";

#[derive(Parser, Debug)]
#[command(name = "srmaster", version)]
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

    let bus_url = config.get_string("bus", "url", "amqp://127.0.0.1:5672");
    let bus = match AmqpBus::connect(&bus_url) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to bus");
            std::process::exit(1);
        }
    };

    let logdir = PathBuf::from(config.get_string("stoneridge", "logs", "/var/stoneridge/logs"));
    let max_attempts = config.get_int("stoneridge", "max_attempts", 5).max(1) as u32;
    let defer_interval = config.get_int("deferrer", "interval_secs", 3600).max(0) as u64;

    let invoker = SubprocessClonerInvoker {
        binary: PathBuf::from(config.get_string("cloner", "binary", "srcloner")),
        config_path: cli.config.clone(),
    };
    let deferrer = SubprocessDeferrerInvoker {
        binary: PathBuf::from(config.get_string("deferrer", "binary", "srdeferrer")),
    };

    let mut should_stop = || false;
    let result = bus.run(
        INTAKE_QUEUE,
        &mut should_stop,
        &mut |body: &[u8]| -> stoneridge_types::Result<()> {
            let request: RunRequest = serde_json::from_slice(body).map_err(|e| {
                stoneridge_types::StoneRidgeError::InvalidRequest(format!("malformed intake message: {e}"))
            })?;
            handle(&request, &invoker, &deferrer, &bus, &logdir, max_attempts, defer_interval)
        },
    );

    if let Err(e) = result {
        tracing::error!(error = %e, "master listener exited");
        std::process::exit(1);
    }
}
