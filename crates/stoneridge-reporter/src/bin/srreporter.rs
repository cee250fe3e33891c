//! Reporter daemon (spec §4.13): consumes the `results` queue serially
//! (prefetch 1, per spec §5), uploading and archiving one message at a
//! time.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_bus::{AmqpBus, QueueListener};
use stoneridge_config::StoneRidgeConfig;
use stoneridge_reporter::{handle, parse_message, GraphClient, QUEUE_NAME};

#[derive(Parser, Debug)]
#[command(name = "srreporter", version)]
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

    let host = config.get_string("report", "host", "");
    let project = config.get_string("report", "project", "");
    let key = config.get_string("report", "key", "");
    let secret = config.get_string("report", "secret", "");
    let graph = GraphClient::new(host, project, key, secret);
    let archives_root = PathBuf::from(config.get_string("stoneridge", "archives", "/var/stoneridge/archives"));

    let mut should_stop = || false;
    let result = bus.run(QUEUE_NAME, &mut should_stop, &mut |body: &[u8]| -> stoneridge_types::Result<()> {
        let message = parse_message(body)?;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        handle(&message, &graph, &archives_root, now)
    });

    if let Err(e) = result {
        tracing::error!(error = %e, "reporter listener exited");
        std::process::exit(1);
    }
}
