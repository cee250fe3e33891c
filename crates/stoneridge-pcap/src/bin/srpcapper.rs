//! Pcap agent daemon (spec §4.11): serves the start/stop/retrieve HTTP
//! surface on a single-threaded accept loop.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_pcap::PcapAgent;

#[derive(Parser, Debug)]
#[command(name = "srpcapper", version)]
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

    let tcpdump = config.get_string("tcpdump", "exe", "tcpdump");
    let interface = config.get_string("tcpdump", "interface", "eth0");
    let our_mac = config.get_string("machine", "macaddr", "");
    let peer_ip = {
        let v = config.get_string("pcap", "peer_ip", "");
        if v.is_empty() { None } else { Some(v) }
    };
    let scratch_root = PathBuf::from(config.get_string("pcap", "scratch", "/tmp/stoneridge-pcap"));
    if let Err(e) = std::fs::create_dir_all(&scratch_root) {
        tracing::error!(error = %e, "failed to create scratch directory");
        std::process::exit(1);
    }

    let bind_addr = config.get_string("pcap", "bind_addr", "0.0.0.0:7227");
    let server = match tiny_http::Server::http(&bind_addr) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, addr = %bind_addr, "failed to bind pcap agent");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %bind_addr, "pcap agent listening");

    let mut agent = PcapAgent::new(tcpdump, interface, our_mac, peer_ip, scratch_root);
    stoneridge_pcap::http::serve(server, &mut agent);
}
