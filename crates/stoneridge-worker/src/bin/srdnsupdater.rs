//! Stage binary: points DNS at this run's netconfig server before the test,
//! and restores it afterward when invoked with `--restore`. After a
//! successful switch, runs the DNS sanity check (spec §9 supplement) and
//! aborts the stage if it fails.

use std::path::PathBuf;

use clap::Parser;
use stoneridge_config::StoneRidgeConfig;
use stoneridge_dns::{sanity_check, RunContext};
use stoneridge_worker::dnsupdater::{reset_dns, set_dns, AGENT_ADDR};
use stoneridge_worker::{netconfig_from, os_from, srid_from};

#[derive(Parser, Debug)]
#[command(name = "srdnsupdater", version)]
struct Cli {
    #[arg(long)]
    config: PathBuf,
    #[arg(long)]
    runconfig: PathBuf,
    /// Append tracing output to this file in addition to stderr.
    #[arg(long)]
    log: Option<PathBuf>,
    #[arg(long)]
    restore: bool,
    /// Expect the canary host to resolve publicly rather than into the
    /// StoneRidge private range (mirrors the `--public` flag on the
    /// standalone DNS sanity checker).
    #[arg(long)]
    public: bool,
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = stoneridge_config::init_logging(cli.log.as_deref()).expect("failed to init logging");

    let config = match StoneRidgeConfig::load_with_overlay(&cli.config, &cli.runconfig) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let agent_addr = config.get_string("dns", "agent_addr", AGENT_ADDR);

    if cli.restore {
        if let Err(e) = reset_dns(&agent_addr) {
            tracing::error!(error = %e, "dnsupdater restore failed");
            std::process::exit(1);
        }
        return;
    }

    let netconfig = match netconfig_from(&config) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "invalid netconfig");
            std::process::exit(1);
        }
    };
    let dns_server = config.get_string(netconfig.as_str(), "dns_server", "");
    if let Err(e) = set_dns(&agent_addr, &dns_server) {
        tracing::error!(error = %e, "dnsupdater failed");
        std::process::exit(1);
    }

    let canary_host = config.get_string("dns", "canary", "example.com");
    let mail_url = config.get_string("mail", "url", "http://127.0.0.1:2255/email");
    let srid = srid_from(&config);
    let ctx = RunContext {
        os: os_from(&config).map(|os| os.as_str()).unwrap_or("unknown"),
        netconfig: netconfig.as_str(),
        srid: &srid,
    };
    if let Err(e) = sanity_check(&canary_host, !cli.public, &mail_url, &ctx) {
        tracing::error!(error = %e, "dns sanity check failed");
        std::process::exit(1);
    }
}
