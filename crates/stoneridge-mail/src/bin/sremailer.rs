//! Mail agent daemon (spec §4.12): binds the `/email` HTTP endpoint and
//! relays each message to the local SMTP server from a fixed sender.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_mail::Relay;

#[derive(Parser, Debug)]
#[command(name = "sremailer", version)]
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

    let relay_host = config.get_string("mail", "relay_host", "localhost");
    let relay_port = config.get_int("mail", "relay_port", 25) as u16;
    let from_address = config.get_string("mail", "from", "stoneridge@example.com");

    let relay = match Relay::new(&relay_host, relay_port, &from_address) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "failed to configure smtp relay");
            std::process::exit(1);
        }
    };

    let bind_addr = config.get_string("mail", "bind_addr", "0.0.0.0:2255");
    let server = match tiny_http::Server::http(&bind_addr) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "failed to bind mail agent");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bind_addr, "mail agent listening");

    stoneridge_mail::http::serve(server, &relay);
}
