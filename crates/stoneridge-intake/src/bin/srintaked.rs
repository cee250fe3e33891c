//! Submission intake daemon (spec §4.3): binds `/srpush`, `/list_unhandled`,
//! and `/mark_handled` behind Basic auth and publishes accepted runs on the
//! `intake` queue.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_bus::AmqpBus;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_intake::{CredentialStore, PushStore};

#[derive(Parser, Debug)]
#[command(name = "srintaked", version)]
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

    let credentials_path =
        PathBuf::from(config.get_string("intake", "credentials", "stoneridge-intake-tokens.toml"));
    let credentials = match CredentialStore::load(&credentials_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, path = ?credentials_path, "failed to load credentials");
            std::process::exit(1);
        }
    };

    let db_path = PathBuf::from(config.get_string("intake", "db", "stoneridge-intake.sqlite3"));
    let store = match PushStore::open(&db_path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to open push store");
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

    let bind_addr = config.get_string("intake", "bind_addr", "0.0.0.0:7229");
    let server = match tiny_http::Server::http(&bind_addr) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "failed to bind intake endpoint");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bind_addr, "intake endpoint listening");

    stoneridge_intake::http::serve(server, &bus, &store, &credentials);
}
