//! Bridge daemon (spec §4.15): consumes the Windows per-OS queue and
//! inserts each message's raw config body into the local SQLite retention
//! queue, one row per message.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_bridge::RetentionQueue;
use stoneridge_bus::{AmqpBus, QueueListener};
use stoneridge_config::StoneRidgeConfig;
use stoneridge_types::request::OperatingSystem;

#[derive(Parser, Debug)]
#[command(name = "srmqproxy", version)]
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

    let db_path = PathBuf::from(config.get_string("bridge", "db", "stoneridge-bridge.sqlite3"));
    let queue = match RetentionQueue::open(&db_path) {
        Ok(q) => q,
        Err(e) => {
            tracing::error!(error = %e, "failed to open retention queue");
            std::process::exit(1);
        }
    };

    let mut should_stop = || false;
    let result = bus.run(
        OperatingSystem::Windows.queue_name(),
        &mut should_stop,
        &mut |body: &[u8]| -> stoneridge_types::Result<()> {
            let config = String::from_utf8_lossy(body).into_owned();
            queue.insert(&config)?;
            Ok(())
        },
    );

    if let Err(e) = result {
        tracing::error!(error = %e, "bridge proxy listener exited");
        std::process::exit(1);
    }
}
