//! Client CLI wrapping the pcap agent's HTTP surface for a worker platform
//! without direct sniffer access, mirroring the upstream `srpcap` agent.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_pcap::{start_capture, stop_and_retrieve};
use stoneridge_types::request::NetConfig;
use stoneridge_types::WorkDirectory;

#[derive(Parser, Debug)]
#[command(name = "srpcap", version)]
struct Cli {
    #[arg(long)]
    config: PathBuf,
    #[arg(long)]
    runconfig: PathBuf,
    #[arg(long, group = "action")]
    start: bool,
    #[arg(long, group = "action")]
    stop: bool,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.start == cli.stop {
        tracing::error!("exactly one of --start or --stop is required");
        std::process::exit(1);
    }

    let config = match StoneRidgeConfig::load_with_overlay(&cli.config, &cli.runconfig) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let macaddr = config.get_string("machine", "macaddr", "");
    let netconfig: NetConfig = match config.get_string("run", "netconfig", "broadband").parse() {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "invalid netconfig");
            std::process::exit(1);
        }
    };
    let host = config.get_string("tcpdump", netconfig.as_str(), "");

    if cli.start {
        start_capture(&host, &macaddr);
        return;
    }

    let work_dir = WorkDirectory {
        root: PathBuf::from(config.get_string("run", "work", ".")),
    };
    let out_dir = work_dir.out_dir();
    let stdout_path = out_dir.join("tcpdump.out");
    let pcap_path = out_dir.join("traffic.pcap");
    if let Err(e) = stop_and_retrieve(&host, &macaddr, &stdout_path, &pcap_path) {
        tracing::error!(error = %e, "failed to stop/retrieve pcap");
        std::process::exit(1);
    }
}
