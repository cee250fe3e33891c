//! Bridge HTTP endpoint (spec §4.15): serves `GET /get_next` against the
//! local SQLite retention queue `srmqproxy` fills.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_bridge::RetentionQueue;
use stoneridge_config::StoneRidgeConfig;

#[derive(Parser, Debug)]
#[command(name = "srwebmq", version)]
struct Cli {
    #[arg(long, default_value = "stoneridge.toml")]
    config: PathBuf,

    /// Append tracing output to this file in addition to stderr.
    #[arg(long)]
    log: Option<PathBuf>,

    #[command(flatten)]
    daemon: stoneridge_config::DaemonArgs,

    /// Delete `done = true` rows older than this many seconds, then exit
    /// without binding the HTTP endpoint. Retention of done rows is
    /// otherwise unbounded (spec §4.15); this is the manual purge.
    #[arg(long)]
    purge_done_older_than_secs: Option<u64>,
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

    let db_path = PathBuf::from(config.get_string("bridge", "db", "stoneridge-bridge.sqlite3"));
    let queue = match RetentionQueue::open(&db_path) {
        Ok(q) => q,
        Err(e) => {
            tracing::error!(error = %e, "failed to open retention queue");
            std::process::exit(1);
        }
    };

    if let Some(secs) = cli.purge_done_older_than_secs {
        match queue.purge_done_older_than(std::time::Duration::from_secs(secs)) {
            Ok(count) => {
                tracing::info!(count, "purged done rows from retention queue");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to purge done rows");
                std::process::exit(1);
            }
        }
    }

    let bind_addr = config.get_string("bridge", "bind_addr", "0.0.0.0:7228");
    let server = match tiny_http::Server::http(&bind_addr) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "failed to bind bridge http endpoint");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bind_addr, "bridge http endpoint listening");

    stoneridge_bridge::http::serve(server, &queue);
}
